use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::AgentError,
    eval::{dataset::Example, matcher::PredictedCall, naming::ToolNameMapper},
    types::ChatMessage,
};

/// An agent under evaluation: one instruction in, the full message trace out.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, instruction: &str) -> Result<Vec<ChatMessage>, AgentError>;
}

/// Messages produced by one agent invocation. Failed invocations leave
/// `messages` empty and record why in `error`.
#[derive(Debug, Clone, Default)]
pub struct AgentTrace {
    pub messages: Vec<ChatMessage>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl AgentTrace {
    fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            messages: Vec::new(),
            error: Some(error.into()),
            duration,
        }
    }
}

pub struct AgentRunner {
    agent: Arc<dyn Agent>,
    mapper: Arc<dyn ToolNameMapper>,
    timeout: Option<Duration>,
}

impl AgentRunner {
    pub fn new(agent: Arc<dyn Agent>, mapper: Arc<dyn ToolNameMapper>) -> Self {
        Self {
            agent,
            mapper,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn mapper(&self) -> &dyn ToolNameMapper {
        self.mapper.as_ref()
    }

    /// Runs the agent on one example. Never fails: recursion overruns,
    /// timeouts and backend errors all come back as an empty trace.
    pub async fn run(&self, example: &Example) -> AgentTrace {
        let started = Instant::now();
        let invocation = self.agent.invoke(&example.instruction);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout(limit)),
            },
            None => invocation.await,
        };
        let duration = started.elapsed();

        match outcome {
            Ok(messages) => {
                debug!(messages = messages.len(), ?duration, "agent finished");
                AgentTrace {
                    messages,
                    error: None,
                    duration,
                }
            }
            Err(AgentError::MaxIterations) => {
                warn!(instruction = %example.instruction, "agent hit the recursion limit");
                AgentTrace::failed(AgentError::MaxIterations.to_string(), duration)
            }
            Err(err) => {
                warn!(instruction = %example.instruction, error = %err, "agent invocation failed");
                AgentTrace::failed(err.to_string(), duration)
            }
        }
    }

    pub fn predicted_calls(&self, trace: &AgentTrace) -> Vec<PredictedCall> {
        extract_tool_calls(&trace.messages, self.mapper.as_ref())
    }
}

/// Every tool call the assistant issued, in emission order.
pub fn extract_tool_calls(messages: &[ChatMessage], mapper: &dyn ToolNameMapper) -> Vec<PredictedCall> {
    messages
        .iter()
        .filter(|message| message.is_assistant())
        .flat_map(|message| message.tool_calls.iter())
        .map(|call| PredictedCall {
            tool_name: call.function.name.clone(),
            arguments: mapper.predicted_arguments(call.function.arguments.clone()),
        })
        .collect()
}
