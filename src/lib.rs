pub mod agent;
pub mod error;
pub mod eval;
pub mod functions;
pub mod providers;
pub mod sessions;
pub mod tools;
pub mod types;

pub use agent::{AgentConfig, ToolCallingAgent};
pub use error::{AgentError, EvalError, LLMError, ToolError};
pub use eval::{Agent, AgentRunner, Evaluator, EvaluatorConfig};
pub use functions::{FunctionCall, FunctionDefinition, Tool, ToolCall};
pub use providers::LLMProvider;
pub use tools::{ToolBackend, ToolDescriptor, ToolResult};
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, MessageRole, TokenUsage};
