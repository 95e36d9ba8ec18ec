use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::LLMError,
    providers::{chat_completions, LLMProvider},
    types::{CompletionRequest, CompletionResponse},
};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    /// Sent as `HTTP-Referer` for OpenRouter's app attribution.
    pub referer: Option<String>,
    pub title: String,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            referer: None,
            title: "atl-eval".to_string(),
        }
    }

    /// `OPENROUTER_API_KEY`, plus optional `OPENROUTER_REFERER`.
    pub fn from_env() -> Result<Self, LLMError> {
        let api_key =
            env::var("OPENROUTER_API_KEY").map_err(|_| LLMError::MissingApiKey("OPENROUTER_API_KEY"))?;
        Ok(Self {
            referer: env::var("OPENROUTER_REFERER").ok(),
            ..Self::new(api_key)
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouter {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouter {
    pub fn from_env() -> Result<Self, LLMError> {
        Self::from_config(OpenRouterConfig::from_env()?)
    }

    pub fn from_config(config: OpenRouterConfig) -> Result<Self, LLMError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMProvider for OpenRouter {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let mut builder = self
            .client
            .post(chat_completions::endpoint(&self.config.base_url, "chat/completions"))
            .bearer_auth(&self.config.api_key)
            .header("X-Title", &self.config.title);
        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        chat_completions::send(builder, &request).await
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}
