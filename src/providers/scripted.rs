use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    functions::{FunctionCall, ToolCall},
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, CompletionResponse},
    LLMError,
};

/// Replays a fixed queue of assistant turns, one per `complete` call.
///
/// Used for dry runs of the evaluator and in tests.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ScriptedTurn>>,
    repeat_last: bool,
}

#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Text(String),
    ToolCalls(Vec<(String, Value)>),
    Fail(String),
}

impl ScriptedTurn {
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCalls(vec![(name.into(), arguments)])
    }

    fn into_message(self, turn: usize) -> Result<ChatMessage, LLMError> {
        match self {
            ScriptedTurn::Text(text) => Ok(ChatMessage::assistant(text)),
            ScriptedTurn::ToolCalls(calls) => {
                let tool_calls = calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, arguments))| {
                        ToolCall::new(FunctionCall::new(name, arguments))
                            .with_id(format!("scripted_{turn}_{i}"))
                    })
                    .collect();
                Ok(ChatMessage::assistant_calls(tool_calls))
            }
            ScriptedTurn::Fail(message) => Err(LLMError::Provider(message)),
        }
    }
}

impl ScriptedProvider {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            responses: Mutex::new(turns.into_iter().collect()),
            repeat_last: false,
        }
    }

    /// Keeps answering with the last scripted turn once the queue is drained.
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        let mut queue = self.responses.lock().ok()?;
        if self.repeat_last && queue.len() == 1 {
            return queue.front().cloned();
        }
        queue.pop_front()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let turn = request.messages.iter().filter(|m| m.is_assistant()).count();
        let Some(next) = self.next_turn() else {
            return Err(LLMError::Provider("no more scripted responses".to_string()));
        };

        Ok(CompletionResponse {
            message: next.into_message(turn)?,
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
