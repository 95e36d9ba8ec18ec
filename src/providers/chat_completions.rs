//! Wire handling shared by the OpenAI-compatible `/chat/completions` providers.

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::{
    error::LLMError,
    types::{ChatMessage, CompletionRequest, CompletionResponse, TokenUsage},
};

#[derive(Debug, Deserialize)]
struct ResponseBody {
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Sends `request` through an authenticated builder and decodes the first choice.
pub(crate) async fn send(
    builder: RequestBuilder,
    request: &CompletionRequest,
) -> Result<CompletionResponse, LLMError> {
    let response = builder.json(request).send().await?;
    let status = response.status();
    let body = response.text().await?;
    decode(status, &body)
}

fn decode(status: StatusCode, body: &str) -> Result<CompletionResponse, LLMError> {
    if !status.is_success() {
        if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str(body) {
            return Err(LLMError::Provider(error.message));
        }
        return Err(LLMError::Provider(format!("unexpected status {status}: {body}")));
    }

    let parsed: ResponseBody = serde_json::from_str(body)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(LLMError::InvalidResponse("response did not contain any choices"))?;

    Ok(CompletionResponse {
        message: choice.message,
        usage: parsed.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_calls_are_decoded_from_the_first_choice() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "apply_Class2Relational_transformation_tool",
                            "arguments": "{\"file_path\":\"/a/b.xmi\"}"
                        }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });

        let response = decode(StatusCode::OK, &body.to_string()).unwrap();
        assert!(response.message.is_assistant());
        assert_eq!(response.message.tool_calls[0].function.arguments, json!({ "file_path": "/a/b.xmi" }));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn provider_error_messages_are_surfaced() {
        let body = json!({ "error": { "message": "model not found" } }).to_string();
        let err = decode(StatusCode::NOT_FOUND, &body).unwrap_err();
        assert!(matches!(err, LLMError::Provider(message) if message == "model not found"));

        let err = decode(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, LLMError::Provider(message) if message.contains("502")));
    }

    #[test]
    fn empty_choices_are_rejected() {
        let err = decode(StatusCode::OK, r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LLMError::InvalidResponse(_)));
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        assert_eq!(
            endpoint("https://openrouter.ai/api/v1/", "/chat/completions"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
