use std::sync::Arc;

use async_trait::async_trait;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    error::AgentError,
    eval::runner::Agent,
    providers::LLMProvider,
    tools::{ToolBackend, ToolDescriptor},
    types::{ChatMessage, CompletionRequest},
};

/// Two steps per tool round (model turn, tool batch) for ten rounds, plus the final answer.
pub const DEFAULT_RECURSION_LIMIT: usize = 2 * 10 + 1;

pub const DEDICATED_SYSTEM_PROMPT: &str = "You are a transformation handler agent.
- To show the details of a transformation X, call list_transformation_X_tool with no input.
- To apply a transformation X to a model, call apply_X_transformation_tool with only the file path.
Always answer by calling one of your tools and return tool output unmodified.

Here are your tools:
{{#each tools}}
- {{name}}: {{description}}
{{/each}}";

pub const GENERIC_SYSTEM_PROMPT: &str = "You are a transformation management agent.
- To list every transformation, call curl_all_transformations_tool.
- To show one transformation, call curl_transformation_by_Name_tool with only its name.
- To apply a transformation, call curl_apply_transformation_tool with \"transformation_name,file_path\".
Return tool output unmodified.

Here are your tools:
{{#each tools}}
- {{name}}: {{description}}
{{/each}}";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    /// Handlebars template rendered with the available `tools`.
    pub system_prompt: String,
    pub recursion_limit: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: DEDICATED_SYSTEM_PROMPT.to_string(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            temperature: Some(0.0),
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Serialize)]
struct PromptData<'a> {
    tools: &'a [ToolDescriptor],
}

/// Model-driven tool loop: the model picks tools, the backend runs them, and
/// results go back to the model until it answers without calling a tool.
pub struct ToolCallingAgent {
    provider: Arc<dyn LLMProvider>,
    backend: Arc<dyn ToolBackend>,
    config: AgentConfig,
}

impl ToolCallingAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, backend: Arc<dyn ToolBackend>, config: AgentConfig) -> Self {
        Self {
            provider,
            backend,
            config,
        }
    }

    fn system_prompt(&self, tools: &[ToolDescriptor]) -> Result<String, AgentError> {
        let mut hb = Handlebars::new();
        // plain-text prompt, no HTML escaping
        hb.register_escape_fn(handlebars::no_escape);
        Ok(hb.render_template(&self.config.system_prompt, &PromptData { tools })?)
    }

    fn request(&self, messages: &[ChatMessage], tools: &[ToolDescriptor]) -> CompletionRequest {
        CompletionRequest::new(self.config.model.clone(), messages.to_vec())
            .with_tools(tools.iter().map(ToolDescriptor::to_tool))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    fn take_step(&self, steps: &mut usize) -> Result<(), AgentError> {
        *steps += 1;
        if *steps > self.config.recursion_limit {
            return Err(AgentError::MaxIterations);
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn invoke(&self, instruction: &str) -> Result<Vec<ChatMessage>, AgentError> {
        let tools = self.backend.list_tools().await?;
        let mut messages = vec![
            ChatMessage::system(self.system_prompt(&tools)?),
            ChatMessage::user(instruction),
        ];

        let mut steps = 0;
        loop {
            self.take_step(&mut steps)?;
            let response = self.provider.complete(self.request(&messages, &tools)).await?;
            if let Some(usage) = &response.usage {
                debug!(
                    prompt = usage.prompt_tokens,
                    completion = usage.completion_tokens,
                    "completion token usage"
                );
            }
            let mut assistant = response.message;
            for (i, call) in assistant.tool_calls.iter_mut().enumerate() {
                if call.id.is_none() {
                    call.id = Some(format!("call_{steps}_{i}"));
                }
            }

            let calls = assistant.tool_calls.clone();
            messages.push(assistant);
            if calls.is_empty() {
                return Ok(messages);
            }

            self.take_step(&mut steps)?;
            for call in calls {
                let id = call.id.unwrap_or_default();
                let name = call.function.name;
                debug!(tool = %name, arguments = %call.function.arguments, "executing tool call");

                let content = match self.backend.call_tool(&name, call.function.arguments).await {
                    Ok(result) => result.render(),
                    Err(err) => {
                        warn!(tool = %name, error = %err, "tool call failed");
                        json!({ "error": err.to_string() }).to_string()
                    }
                };
                messages.push(ChatMessage::tool(id, content));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::Value;

    use crate::error::ToolError;
    use crate::providers::scripted::{ScriptedProvider, ScriptedTurn};
    use crate::tools::ToolResult;
    use crate::types::MessageRole;

    #[derive(Default)]
    struct EchoBackend {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolBackend for EchoBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(vec![ToolDescriptor::new("apply_A2B_transformation_tool", "Applies A2B")])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
            self.calls.lock().unwrap().push(name.to_string());
            if name == "apply_A2B_transformation_tool" {
                Ok(ToolResult::text(format!("applied {arguments}")))
            } else {
                Err(ToolError::UnknownTool(name.to_string()))
            }
        }
    }

    fn agent(turns: Vec<ScriptedTurn>, limit: usize) -> (Arc<EchoBackend>, ToolCallingAgent) {
        let backend = Arc::new(EchoBackend::default());
        let agent = ToolCallingAgent::new(
            Arc::new(ScriptedProvider::new(turns)),
            backend.clone(),
            AgentConfig::new("scripted").with_recursion_limit(limit),
        );
        (backend, agent)
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_until_final_answer() {
        let (backend, agent) = agent(
            vec![
                ScriptedTurn::tool_call("apply_A2B_transformation_tool", json!({ "file_path": "/a.xmi" })),
                ScriptedTurn::Text("done".into()),
            ],
            DEFAULT_RECURSION_LIMIT,
        );

        let messages = agent.invoke("apply A2B to /a.xmi").await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
        assert!(messages[0].text().unwrap().contains("- apply_A2B_transformation_tool: Applies A2B"));
        assert!(messages[3].text().unwrap().starts_with("applied"));
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tool_errors_do_not_abort_the_run() {
        let (_, agent) = agent(
            vec![
                ScriptedTurn::tool_call("apply_Missing_transformation_tool", json!({ "file_path": "/a.xmi" })),
                ScriptedTurn::Text("sorry".into()),
            ],
            DEFAULT_RECURSION_LIMIT,
        );

        let messages = agent.invoke("apply Missing").await.unwrap();
        let tool_message: Value = serde_json::from_str(messages[3].text().unwrap()).unwrap();
        assert_eq!(tool_message["error"], "unknown tool: apply_Missing_transformation_tool");
        assert_eq!(messages.last().unwrap().text(), Some("sorry"));
    }

    #[tokio::test]
    async fn endless_tool_loops_hit_the_recursion_limit() {
        let provider = ScriptedProvider::new(vec![ScriptedTurn::tool_call(
            "apply_A2B_transformation_tool",
            json!({ "file_path": "/a.xmi" }),
        )])
        .repeating();
        let backend = Arc::new(EchoBackend::default());
        let agent = ToolCallingAgent::new(
            Arc::new(provider),
            backend.clone(),
            AgentConfig::new("scripted").with_recursion_limit(5),
        );

        let err = agent.invoke("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations));
        // steps: complete, tools, complete, tools, complete, then the sixth step overflows
        assert_eq!(backend.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn system_prompt_keeps_quotes_unescaped() {
        let (_, agent) = agent(Vec::new(), DEFAULT_RECURSION_LIMIT);
        let tools = [ToolDescriptor::new(
            "curl_apply_transformation_tool",
            "Input must be 'transformation_name,file_path' & nothing else",
        )];
        let prompt = agent.system_prompt(&tools).unwrap();
        assert!(prompt.contains("- curl_apply_transformation_tool: Input must be 'transformation_name,file_path' & nothing else"));
    }

    #[test]
    fn sampling_settings_reach_the_request() {
        let agent = ToolCallingAgent::new(
            Arc::new(ScriptedProvider::new(Vec::new())),
            Arc::new(EchoBackend::default()),
            AgentConfig::new("gpt-4o-mini").with_temperature(0.2).with_max_tokens(256),
        );
        let request = agent.request(&[ChatMessage::user("hi")], &[]);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(256));
        assert!(request.tools.is_empty());
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let (_, agent) = agent(vec![ScriptedTurn::Fail("rate limited".into())], DEFAULT_RECURSION_LIMIT);
        let err = agent.invoke("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }
}
