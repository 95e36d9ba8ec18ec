use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ToolError;
use crate::tools::{
    engine::TransformationService,
    registry::{HandlerRegistry, ToolKind},
    string_argument, xmi, ToolBackend, ToolDescriptor, ToolResult,
};

/// Exposes one apply tool and one get tool per enabled transformation.
pub struct DedicatedToolBackend {
    engine: Arc<dyn TransformationService>,
    registry: HandlerRegistry,
}

impl DedicatedToolBackend {
    /// Fetches the enabled transformations and registers their tools.
    pub async fn connect(engine: Arc<dyn TransformationService>) -> Result<Self, ToolError> {
        let transformations = engine.list_enabled().await?;
        let registry = HandlerRegistry::from_transformations(&transformations);
        info!(
            transformations = transformations.len(),
            tools = registry.len(),
            "registered dedicated transformation tools"
        );
        Ok(Self::with_registry(engine, registry))
    }

    pub fn with_registry(engine: Arc<dyn TransformationService>, registry: HandlerRegistry) -> Self {
        Self { engine, registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    async fn apply(&self, transformation: &str, tool: &str, arguments: &Value) -> Result<ToolResult, ToolError> {
        let file_path = string_argument(tool, "file_path", arguments)?;
        let path = Path::new(&file_path);
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(ToolResult::error_text(format!("Error: File not found at {file_path}")));
        }

        let output = self.engine.apply(transformation, path).await?;
        Ok(ToolResult::text(format!("Transformation {transformation} applied:\n{output}")))
    }

    async fn describe(&self, transformation: &str) -> Result<ToolResult, ToolError> {
        let details = self.engine.get_transformation(transformation).await?;
        Ok(ToolResult::text(format!(
            "The transformation '{transformation}':\n{details} successfully fetched."
        )))
    }
}

#[async_trait]
impl ToolBackend for DedicatedToolBackend {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut tools = self.registry.descriptors();
        tools.push(xmi::extract_tool_descriptor());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        debug!(tool = name, %arguments, "dedicated tool call");
        if name == xmi::EXTRACT_TOOL {
            let file_path = string_argument(name, "file_path", &arguments)?;
            return Ok(xmi::extract_from_file(Path::new(&file_path)).await);
        }

        let handler = self
            .registry
            .resolve(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        match handler.kind {
            ToolKind::Apply => self.apply(&handler.transformation, name, &arguments).await,
            ToolKind::Get => self.describe(&handler.transformation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::tools::engine::{MetamodelRef, Transformation};

    #[derive(Default)]
    struct FakeEngine {
        applied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TransformationService for FakeEngine {
        async fn list_enabled(&self) -> Result<Vec<Transformation>, ToolError> {
            Ok(vec![Transformation {
                name: "Families2Persons".into(),
                description: None,
                enabled: Some(true),
                input_metamodels: vec![MetamodelRef { name: None, path: "Families.ecore".into() }],
                output_metamodels: vec![MetamodelRef { name: None, path: "Persons.ecore".into() }],
            }])
        }

        async fn get_transformation(&self, name: &str) -> Result<String, ToolError> {
            Ok(format!("{{\"name\":\"{name}\"}}"))
        }

        async fn find_by_metamodels(&self, _input: &str, _output: &str) -> Result<String, ToolError> {
            Ok("[]".into())
        }

        async fn apply(&self, name: &str, file: &Path) -> Result<String, ToolError> {
            self.applied.lock().unwrap().push(format!("{name}:{}", file.display()));
            Ok("<persons/>".into())
        }
    }

    async fn backend() -> (Arc<FakeEngine>, DedicatedToolBackend) {
        let engine = Arc::new(FakeEngine::default());
        let backend = DedicatedToolBackend::connect(engine.clone()).await.unwrap();
        (engine, backend)
    }

    #[tokio::test]
    async fn lists_tools_for_every_transformation() {
        let (_, backend) = backend().await;
        let names: Vec<String> = backend.list_tools().await.unwrap().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&"apply_Families2Persons_transformation_tool".to_string()));
        assert!(names.contains(&"list_transformation_Families2Persons_tool".to_string()));
        assert!(names.contains(&"extract_input_metamodel_name".to_string()));
    }

    #[tokio::test]
    async fn apply_uploads_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("sample.xmi");
        std::fs::write(&model, "<families/>").unwrap();

        let (engine, backend) = backend().await;
        let result = backend
            .call_tool(
                "apply_Families2Persons_transformation_tool",
                json!({ "file_path": model.display().to_string() }),
            )
            .await
            .unwrap();

        assert_eq!(result.render(), "Transformation Families2Persons applied:\n<persons/>");
        assert_eq!(engine.applied.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_model_file_is_reported_without_calling_the_engine() {
        let (engine, backend) = backend().await;
        let result = backend
            .call_tool("apply_Families2Persons_transformation_tool", json!({ "file_path": "/nope.xmi" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.render(), "Error: File not found at /nope.xmi");
        assert!(engine.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_tool_describes_the_transformation() {
        let (_, backend) = backend().await;
        let result = backend
            .call_tool("list_transformation_Families2Persons_tool", json!({}))
            .await
            .unwrap();
        assert!(result.render().starts_with("The transformation 'Families2Persons':"));
    }

    #[tokio::test]
    async fn unknown_tools_are_errors() {
        let (_, backend) = backend().await;
        let err = backend.call_tool("apply_Nope_transformation_tool", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }
}
