//! MCP-shaped tool boundary and the transformation-engine backends behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::functions::{FunctionDefinition, Tool};

pub mod dedicated;
pub mod engine;
pub mod generic;
pub mod registry;
pub mod xmi;

pub use dedicated::DedicatedToolBackend;
pub use engine::{EngineConfig, MetamodelRef, Transformation, TransformationEngine, TransformationService};
pub use generic::GenericToolBackend;
pub use registry::{HandlerDescriptor, HandlerRegistry, ToolKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_schema(),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn to_tool(&self) -> Tool {
        FunctionDefinition::new(&self.name)
            .with_description(&self.description)
            .with_parameters(self.input_schema.clone())
            .to_tool()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Data { data: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn data(data: Value) -> Self {
        Self {
            content: vec![ContentBlock::Data { data }],
            is_error: false,
        }
    }

    /// A failure reported to the model as content rather than as a transport error.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Flattens the content blocks into the text handed back to the model.
    pub fn render(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::Data { data } => data.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError>;
}

/// Reads a single string parameter, accepting either `{key: "..."}`, the first
/// emitted value of any other object, or a bare string.
pub(crate) fn string_argument(tool: &str, key: &str, arguments: &Value) -> Result<String, ToolError> {
    let value = match arguments {
        Value::Object(fields) => fields.get(key).or_else(|| fields.values().next()),
        other => Some(other),
    };
    match value {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Null) | None => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: format!("missing `{key}`"),
        }),
        Some(other) => Ok(other.to_string()),
    }
}
