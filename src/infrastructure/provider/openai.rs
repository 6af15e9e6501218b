//! OpenAI-compatible client (works with OpenAI, Groq, Mistral, etc.)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CompletionRequest, HttpProviderBase, ProviderClient, ProviderError, ProviderInitError};
use crate::config::ProviderSettings;
use crate::types::{ChatMessage, Completion, MessageRole, ToolCallRequest, ToolDefinition};

/// OpenAI-compatible chat-completions protocol. Tool calls come back as a
/// top-level `tool_calls` list on the choice message, with the arguments
/// encoded as a JSON string.
#[derive(Clone)]
pub struct OpenAiClient {
    base: HttpProviderBase,
}

impl OpenAiClient {
    pub fn from_settings(config: &ProviderSettings) -> Result<Self, ProviderInitError> {
        Ok(Self {
            base: HttpProviderBase::from_settings(config)?,
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = self.base.build_url("/v1/chat/completions");

        let payload = ChatCompletionRequest {
            model: self.base.model.clone(),
            messages: request.messages.iter().map(message_to_wire).collect(),
            tools: tools_to_wire(&request.tools),
            max_tokens: request.max_output_tokens,
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request to OpenAI-compatible provider"
        );

        let response: ChatCompletionResponse = self
            .base
            .send(
                self.base.http.post(&url).bearer_auth(&self.base.api_key),
                &payload,
            )
            .await?;
        debug!("Received response from OpenAI-compatible provider");

        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| ProviderError::invalid_response(&self.base.id, "missing choices"))?;

        let mut completion = Completion::default();
        if let Some(content) = message.content {
            if !content.is_empty() {
                completion.text_segments.push(content);
            }
        }
        for call in message.tool_calls {
            let arguments: Value = serde_json::from_str(&call.function.arguments)
                .map_err(|err| {
                    ProviderError::invalid_response(
                        &self.base.id,
                        format!("tool call arguments are not valid JSON: {err}"),
                    )
                })?;
            completion.tool_calls.push(ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments,
            });
        }

        Ok(completion)
    }
}

fn message_to_wire(message: &ChatMessage) -> Value {
    match message.role {
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        MessageRole::Assistant if !message.tool_calls.is_empty() => json!({
            "role": "assistant",
            "content": message.content,
            "tool_calls": message
                .tool_calls
                .iter()
                .map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    },
                }))
                .collect::<Vec<_>>(),
        }),
        role => json!({
            "role": role.as_str(),
            "content": message.text(),
        }),
    }
}

fn tools_to_wire(tools: &[ToolDefinition]) -> Option<Vec<Value>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect(),
    )
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallResult;

    #[test]
    fn tool_messages_carry_call_id_on_the_wire() {
        let result = ToolCallResult::success("call-9", json!({"ok": true}));
        let wire = message_to_wire(&ChatMessage::tool_result(&result));
        assert_eq!(wire["role"], json!("tool"));
        assert_eq!(wire["tool_call_id"], json!("call-9"));
        assert_eq!(wire["content"], json!(r#"{"ok":true}"#));
    }

    #[test]
    fn assistant_tool_request_restates_calls_with_string_arguments() {
        let message = ChatMessage::tool_request(vec![ToolCallRequest {
            id: "call-1".to_string(),
            name: "calculate_roi".to_string(),
            arguments: json!({"initial_investment": 100000}),
        }]);
        let wire = message_to_wire(&message);
        assert_eq!(wire["tool_calls"][0]["id"], json!("call-1"));
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"initial_investment":100000}"#)
        );
    }

    #[test]
    fn empty_tool_list_is_omitted_from_payload() {
        assert!(tools_to_wire(&[]).is_none());
    }

    #[test]
    fn response_tool_calls_parse_from_string_arguments() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-a",
                        "type": "function",
                        "function": {
                            "name": "fetch_renewable_data",
                            "arguments": "{\"energy_type\":\"solar\"}"
                        }
                    }]
                }
            }]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).expect("parse response");
        let message = parsed.choices[0].message.as_ref().expect("message present");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].function.name, "fetch_renewable_data");
    }
}
