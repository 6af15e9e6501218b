//! Legacy text-completion client with no tool-calling support

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CompletionRequest, HttpProviderBase, ProviderClient, ProviderError, ProviderInitError};
use crate::config::ProviderSettings;
use crate::types::{ChatMessage, Completion, MessageRole};

/// Degraded vendor family: the conversation is flattened into a single
/// Human/Assistant prompt and tool schemas are silently ignored, so the
/// reply is always text-only.
#[derive(Clone)]
pub struct LegacyTextClient {
    base: HttpProviderBase,
}

impl LegacyTextClient {
    pub fn from_settings(config: &ProviderSettings) -> Result<Self, ProviderInitError> {
        Ok(Self {
            base: HttpProviderBase::from_settings(config)?,
        })
    }
}

#[async_trait]
impl ProviderClient for LegacyTextClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        if !request.tools.is_empty() {
            debug!(
                provider = self.base.id.as_str(),
                tools = request.tools.len(),
                "Legacy provider does not support tool calling; ignoring tool schemas"
            );
        }

        let url = self.base.build_url("/v1/complete");
        let payload = LegacyCompletionRequest {
            model: self.base.model.clone(),
            prompt: flatten_messages(&request.messages),
            max_tokens_to_sample: request.max_output_tokens,
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            "Sending completion request to legacy text provider"
        );

        let response: LegacyCompletionResponse = self
            .base
            .send(
                self.base
                    .http
                    .post(&url)
                    .header("x-api-key", &self.base.api_key),
                &payload,
            )
            .await?;
        debug!("Received response from legacy text provider");

        let mut completion = Completion::default();
        let text = response.completion.trim().to_string();
        if !text.is_empty() {
            completion.text_segments.push(text);
        }
        Ok(completion)
    }
}

/// Flatten the structured conversation into the legacy Human/Assistant
/// prompt format. Tool results are folded into Human turns so a fallback
/// after a tool-calling provider still sees them.
fn flatten_messages(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        match message.role {
            MessageRole::System => {
                prompt.push_str(&format!(
                    "\n\nHuman: <s>{}</s>\n\nAssistant: I'll follow those instructions.",
                    message.text()
                ));
            }
            MessageRole::User => {
                prompt.push_str(&format!("\n\nHuman: {}", message.text()));
            }
            MessageRole::Assistant => {
                let text = message.text();
                if !text.is_empty() {
                    prompt.push_str(&format!("\n\nAssistant: {text}"));
                }
            }
            MessageRole::Tool => {
                prompt.push_str(&format!("\n\nHuman: [tool result] {}", message.text()));
            }
        }
    }
    prompt.push_str("\n\nAssistant:");
    prompt
}

#[derive(Serialize)]
struct LegacyCompletionRequest {
    model: String,
    prompt: String,
    max_tokens_to_sample: u32,
}

#[derive(Deserialize)]
struct LegacyCompletionResponse {
    completion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_flattening_keeps_turn_structure() {
        let messages = vec![
            ChatMessage::new(MessageRole::System, "stay on topic"),
            ChatMessage::new(MessageRole::User, "how does wind power work?"),
            ChatMessage::new(MessageRole::Assistant, "Turbines convert kinetic energy."),
            ChatMessage::new(MessageRole::User, "and offshore?"),
        ];
        let prompt = flatten_messages(&messages);
        assert!(prompt.contains("Human: <s>stay on topic</s>"));
        assert!(prompt.contains("Human: how does wind power work?"));
        assert!(prompt.contains("Assistant: Turbines convert kinetic energy."));
        assert!(prompt.ends_with("\n\nAssistant:"));
    }

    #[test]
    fn tool_results_fold_into_human_turns() {
        let result = crate::types::ToolCallResult::success(
            "call-1",
            serde_json::json!({"capacity": 1200}),
        );
        let prompt = flatten_messages(&[ChatMessage::tool_result(&result)]);
        assert!(prompt.contains(r#"Human: [tool result] {"capacity":1200}"#));
    }
}
