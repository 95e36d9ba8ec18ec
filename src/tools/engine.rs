use std::{env, path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ToolError;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetamodelRef {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
}

impl MetamodelRef {
    /// File stem of the metamodel path without `.ecore`, e.g. `Class` for `mm/Class.ecore`.
    pub fn model_name(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.strip_suffix(".ecore").unwrap_or(file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub input_metamodels: Vec<MetamodelRef>,
    #[serde(default)]
    pub output_metamodels: Vec<MetamodelRef>,
}

impl Transformation {
    pub fn input_model(&self) -> Option<&str> {
        self.input_metamodels.first().map(MetamodelRef::model_name)
    }

    pub fn output_model(&self) -> Option<&str> {
        self.output_metamodels.first().map(MetamodelRef::model_name)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl EngineConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// HTTP client for the ATL transformation server.
#[derive(Debug, Clone)]
pub struct TransformationEngine {
    client: Client,
    config: EngineConfig,
}

impl TransformationEngine {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ToolError> {
        Self::from_config(EngineConfig::default().with_base_url(base_url))
    }

    /// Uses `ATL_SERVER_URL` when set.
    pub fn from_env() -> Result<Self, ToolError> {
        let mut config = EngineConfig::default();
        if let Ok(base_url) = env::var("ATL_SERVER_URL") {
            config.base_url = base_url;
        }
        Self::from_config(config)
    }

    pub fn from_config(config: EngineConfig) -> Result<Self, ToolError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Operations the tool backends need from a transformation server.
#[async_trait]
pub trait TransformationService: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<Transformation>, ToolError>;

    /// Raw description of one transformation as the server renders it.
    async fn get_transformation(&self, name: &str) -> Result<String, ToolError>;

    /// Names of the transformations whose metamodels match `input` and `output`.
    async fn find_by_metamodels(&self, input: &str, output: &str) -> Result<String, ToolError>;

    /// Uploads `file` as the `IN` model and returns the transformed output.
    async fn apply(&self, name: &str, file: &Path) -> Result<String, ToolError>;
}

#[async_trait]
impl TransformationService for TransformationEngine {
    async fn list_enabled(&self) -> Result<Vec<Transformation>, ToolError> {
        let response = self.client.get(self.endpoint("transformations/enabled")).send().await?;
        let body = checked_text(response).await?;
        let transformations: Vec<Transformation> = serde_json::from_str(&body)?;
        debug!(count = transformations.len(), "fetched enabled transformations");
        Ok(transformations)
    }

    async fn get_transformation(&self, name: &str) -> Result<String, ToolError> {
        let url = self.endpoint(&format!("transformation/{name}"));
        checked_text(self.client.get(url).send().await?).await
    }

    async fn find_by_metamodels(&self, input: &str, output: &str) -> Result<String, ToolError> {
        let input = format!("{input}.ecore");
        let output = format!("{output}.ecore");
        let response = self
            .client
            .get(self.endpoint("transformation/hasTransformation"))
            .query(&[("inputMetamodel", input.as_str()), ("outputMetamodel", output.as_str())])
            .send()
            .await?;
        checked_text(response).await
    }

    async fn apply(&self, name: &str, file: &Path) -> Result<String, ToolError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model.xmi".to_string());
        let form = multipart::Form::new().part("IN", multipart::Part::bytes(bytes).file_name(file_name));

        debug!(transformation = name, file = %file.display(), "applying transformation");
        let url = self.endpoint(&format!("transformation/{name}/apply"));
        checked_text(self.client.post(url).multipart(form).send().await?).await
    }
}

async fn checked_text(response: Response) -> Result<String, ToolError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ToolError::Engine {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transformation_listing_deserializes() {
        let listing: Vec<Transformation> = serde_json::from_value(json!([{
            "name": "Class2Relational",
            "atlFile": "Class2Relational.atl",
            "enabled": true,
            "input_metamodels": [{ "name": "Class", "path": "transformations/Class2Relational/Class.ecore" }],
            "output_metamodels": [{ "name": "Relational", "path": "transformations/Class2Relational/Relational.ecore" }]
        }]))
        .unwrap();

        assert_eq!(listing[0].input_model(), Some("Class"));
        assert_eq!(listing[0].output_model(), Some("Relational"));
    }

    #[test]
    fn model_name_handles_bare_file_names() {
        let mm = MetamodelRef { name: None, path: "KM3.ecore".into() };
        assert_eq!(mm.model_name(), "KM3");
    }

    #[test]
    fn endpoints_join_cleanly() {
        let engine = TransformationEngine::new("http://localhost:8080/").unwrap();
        assert_eq!(
            engine.endpoint("/transformations/enabled"),
            "http://localhost:8080/transformations/enabled"
        );
    }
}
