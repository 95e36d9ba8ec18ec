use serde::{Deserialize, Serialize};

use crate::functions::{Tool, ToolCall};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn of an agent conversation. Assistant turns that call tools usually
/// carry no text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    fn text_turn(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text_turn(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text_turn(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text_turn(MessageRole::Assistant, content)
    }

    /// An assistant turn consisting only of tool calls.
    pub fn assistant_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls,
        }
    }

    /// The rendered output of one tool call, answering `call_id`.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::text_turn(MessageRole::Tool, content)
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Body of an OpenAI-compatible `/chat/completions` request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools<I>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = Tool>,
    {
        self.tools.extend(tools);
        self
    }

    pub fn with_max_tokens(mut self, value: Option<u32>) -> Self {
        self.max_tokens = value;
        self
    }

    pub fn with_temperature(mut self, value: Option<f32>) -> Self {
        self.temperature = value;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: ChatMessage,
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionCall;
    use serde_json::json;

    #[test]
    fn request_omits_empty_tools_and_unset_sampling() {
        let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({ "model": "gpt-4o-mini", "messages": [{ "role": "user", "content": "hi" }] })
        );
    }

    #[test]
    fn tool_turns_reference_their_call() {
        let call = ToolCall::new(FunctionCall::new("list_transformation_A2B_tool", json!({}))).with_id("call_1");
        let assistant = serde_json::to_value(ChatMessage::assistant_calls(vec![call])).unwrap();
        assert!(assistant.get("content").is_none());
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{}");

        let tool = serde_json::to_value(ChatMessage::tool("call_1", "ok")).unwrap();
        assert_eq!(tool, json!({ "role": "tool", "content": "ok", "tool_call_id": "call_1" }));
    }
}
