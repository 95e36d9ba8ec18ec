use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ToolError;
use crate::eval::naming::{GENERIC_APPLY_TOOL, GENERIC_GET_TOOL};
use crate::functions::{FunctionParameter, FunctionParameters};
use crate::tools::{
    engine::TransformationService, string_argument, xmi, ToolBackend, ToolDescriptor, ToolResult,
};

pub const LIST_ALL_TOOL: &str = "curl_all_transformations_tool";
pub const FIND_NAME_TOOL: &str = "get_transformation_name";

/// A fixed set of tools that take the transformation name as an argument.
pub struct GenericToolBackend {
    engine: Arc<dyn TransformationService>,
}

impl GenericToolBackend {
    pub fn new(engine: Arc<dyn TransformationService>) -> Self {
        Self { engine }
    }

    async fn list_all(&self) -> Result<ToolResult, ToolError> {
        let transformations = self.engine.list_enabled().await?;
        let listing = serde_json::to_string(&transformations)?;
        Ok(ToolResult::text(format!("Available transformations:\n{listing}")))
    }

    async fn by_name(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let name = string_argument(GENERIC_GET_TOOL, "query", arguments)?;
        let details = self.engine.get_transformation(&name).await?;
        Ok(ToolResult::text(format!("The transformation with '{name}':\n{details}")))
    }

    async fn apply(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let input = string_argument(GENERIC_APPLY_TOOL, "input_str", arguments)?;
        if input.contains("https://") || input.contains("http://") {
            return Ok(ToolResult::error_text(
                "Error: Do NOT include any URLs. Input should ONLY be in the format 'transformation_name,file_path'.",
            ));
        }

        let Some((name, file_path)) = split_pair(&input) else {
            return Ok(ToolResult::error_text(
                "Error: Input MUST have exactly two parts separated by a comma. Format: 'transformation_name,file_path'.",
            ));
        };

        let output = self.engine.apply(name, Path::new(file_path)).await?;
        Ok(ToolResult::text(output))
    }

    async fn find_name(&self, arguments: &Value) -> Result<ToolResult, ToolError> {
        let input = string_argument(FIND_NAME_TOOL, "input_str", arguments)?;
        let Some((input_mm, output_mm)) = split_pair(&input) else {
            return Ok(ToolResult::error_text(
                "Error: Input must contain exactly two comma-separated metamodel names, e.g., 'inputMetamodel, outputMetamodel'.",
            ));
        };

        let names = self.engine.find_by_metamodels(input_mm, output_mm).await?;
        Ok(ToolResult::text(names))
    }
}

/// `"a, b"` into `("a", "b")`; anything other than exactly two parts is rejected.
fn split_pair(input: &str) -> Option<(&str, &str)> {
    let mut parts = input.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => Some((first.trim(), second.trim())),
        _ => None,
    }
}

fn string_schema(key: &str, description: &str) -> Value {
    FunctionParameters::new()
        .with_parameter(FunctionParameter::string(key).with_description(description))
        .into_schema()
}

#[async_trait]
impl ToolBackend for GenericToolBackend {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(vec![
            ToolDescriptor::new(
                LIST_ALL_TOOL,
                "Retrieves a complete list of all available transformations with their detailed configurations",
            ),
            ToolDescriptor::new(
                GENERIC_GET_TOOL,
                "Retrieves detailed informations about a single transformation by providing its name. Input should be the exact transformation name as a string",
            )
            .with_input_schema(string_schema("query", "Transformation name")),
            ToolDescriptor::new(
                GENERIC_APPLY_TOOL,
                "Executes a transformation on a specified file. Input must be provided in the format: 'transformation_name,file_path' (note the comma separator).",
            )
            .with_input_schema(string_schema("input_str", "transformation_name,file_path")),
            ToolDescriptor::new(
                FIND_NAME_TOOL,
                "Retrieves the name of a transformation based on matching input and output metamodel names. Accepts input as {'input_str': 'DSL, KM3'}.",
            )
            .with_input_schema(string_schema("input_str", "inputMetamodel, outputMetamodel")),
            xmi::extract_tool_descriptor(),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        debug!(tool = name, %arguments, "generic tool call");
        match name {
            LIST_ALL_TOOL => self.list_all().await,
            GENERIC_GET_TOOL => self.by_name(&arguments).await,
            GENERIC_APPLY_TOOL => self.apply(&arguments).await,
            FIND_NAME_TOOL => self.find_name(&arguments).await,
            xmi::EXTRACT_TOOL => {
                let file_path = string_argument(name, "file_path", &arguments)?;
                Ok(xmi::extract_from_file(Path::new(&file_path)).await)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
