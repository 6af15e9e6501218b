//! Anthropic messages client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CompletionRequest, HttpProviderBase, ProviderClient, ProviderError, ProviderInitError};
use crate::config::ProviderSettings;
use crate::types::{ChatMessage, Completion, MessageRole, ToolCallRequest, ToolDefinition};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages protocol. Tool calls arrive as `tool_use` content
/// blocks interleaved with `text` blocks; system messages are hoisted into
/// the top-level `system` field.
#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpProviderBase,
}

impl AnthropicClient {
    pub fn from_settings(config: &ProviderSettings) -> Result<Self, ProviderInitError> {
        Ok(Self {
            base: HttpProviderBase::from_settings(config)?,
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = self.base.build_url("/v1/messages");
        let (system, messages) = split_system(&request.messages);

        let payload = MessagesRequest {
            model: self.base.model.clone(),
            max_tokens: request.max_output_tokens,
            system,
            messages,
            tools: tools_to_wire(&request.tools),
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request to Anthropic"
        );

        let response: MessagesResponse = self
            .base
            .send(
                self.base
                    .http
                    .post(&url)
                    .header("x-api-key", &self.base.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
                &payload,
            )
            .await?;
        debug!("Received response from Anthropic");

        let mut completion = Completion::default();
        for block in response.content {
            match block.kind.as_str() {
                "text" => {
                    if let Some(text) = block.text {
                        if !text.is_empty() {
                            completion.text_segments.push(text);
                        }
                    }
                }
                "tool_use" => {
                    let (Some(id), Some(name)) = (block.id, block.name) else {
                        return Err(ProviderError::invalid_response(
                            &self.base.id,
                            "tool_use block missing id or name",
                        ));
                    };
                    completion.tool_calls.push(ToolCallRequest {
                        id,
                        name,
                        arguments: block.input.unwrap_or_else(|| json!({})),
                    });
                }
                other => {
                    debug!(block_type = other, "Ignoring unrecognized content block");
                }
            }
        }

        Ok(completion)
    }
}

/// Hoist system messages into the `system` field and convert the rest to the
/// Anthropic message shape. Tool results travel as `tool_result` blocks in a
/// user turn.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system_parts = Vec::new();
    let mut wire = Vec::new();

    for message in messages {
        match message.role {
            MessageRole::System => system_parts.push(message.text().to_string()),
            MessageRole::Tool => wire.push(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id,
                    "content": message.text(),
                }],
            })),
            MessageRole::Assistant if !message.tool_calls.is_empty() => {
                let mut blocks = Vec::new();
                if let Some(text) = &message.content {
                    if !text.is_empty() {
                        blocks.push(json!({ "type": "text", "text": text }));
                    }
                }
                for call in &message.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                wire.push(json!({ "role": "assistant", "content": blocks }));
            }
            role => wire.push(json!({
                "role": role.as_str(),
                "content": message.text(),
            })),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, wire)
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
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect(),
    )
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallResult;

    #[test]
    fn system_messages_are_hoisted() {
        let messages = vec![
            ChatMessage::new(MessageRole::System, "be concise"),
            ChatMessage::new(MessageRole::User, "hello"),
        ];
        let (system, wire) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("be concise"));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], json!("user"));
    }

    #[test]
    fn tool_results_become_tool_result_blocks() {
        let result = ToolCallResult::success("toolu-1", json!({"status": "success"}));
        let (_, wire) = split_system(&[ChatMessage::tool_result(&result)]);
        assert_eq!(wire[0]["role"], json!("user"));
        assert_eq!(wire[0]["content"][0]["type"], json!("tool_result"));
        assert_eq!(wire[0]["content"][0]["tool_use_id"], json!("toolu-1"));
    }

    #[test]
    fn tool_use_blocks_parse_into_tool_calls() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "Let me check the data."},
                {"type": "tool_use", "id": "toolu-2", "name": "fetch_renewable_data",
                 "input": {"energy_type": "wind"}}
            ]
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).expect("parse response");
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.content[1].kind, "tool_use");
        assert_eq!(parsed.content[1].name.as_deref(), Some("fetch_renewable_data"));
    }
}
