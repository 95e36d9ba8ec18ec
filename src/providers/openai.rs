use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::LLMError,
    providers::{chat_completions, LLMProvider},
    types::{CompletionRequest, CompletionResponse},
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// `OPENAI_API_KEY`, plus optional `OPENAI_BASE_URL` for compatible gateways
    /// and `OPENAI_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, LLMError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| LLMError::MissingApiKey("OPENAI_API_KEY"))?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(ms) = env::var("OPENAI_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config = config.with_timeout(Duration::from_millis(ms));
        }

        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAI {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAI {
    pub fn from_env() -> Result<Self, LLMError> {
        Self::from_config(OpenAIConfig::from_env()?)
    }

    pub fn from_config(config: OpenAIConfig) -> Result<Self, LLMError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMProvider for OpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let builder = self
            .client
            .post(chat_completions::endpoint(&self.config.base_url, "chat/completions"))
            .bearer_auth(&self.config.api_key);
        chat_completions::send(builder, &request).await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
