use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(&'static str),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("transformation engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transformation engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Max iterations reached")]
    MaxIterations,

    #[error("agent timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("failed to render system prompt: {0}")]
    Template(#[from] handlebars::RenderError),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid dataset: {0}")]
    Dataset(String),

    #[error("evaluator is {actual}, expected {expected}")]
    State {
        expected: &'static str,
        actual: &'static str,
    },
}
