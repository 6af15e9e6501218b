use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A single tool invocation requested by the model. The `id` correlates the
/// request with the tool-role message that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Assistant message restating the tool calls the model requested.
    /// Providers expect this message to precede the paired tool results.
    pub fn tool_request(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls,
        }
    }

    /// Tool-role message carrying one execution result back to the model.
    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(result.payload.to_string()),
            tool_call_id: Some(result.tool_call_id.clone()),
            tool_calls: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Success,
    Error,
}

/// Outcome of executing one tool call. Every dispatched request produces
/// exactly one of these, failures included; a dropped result would
/// desynchronize the conversation from the provider's pairing expectations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub status: ToolCallStatus,
    pub payload: Value,
}

impl ToolCallResult {
    pub fn success(tool_call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            status: ToolCallStatus::Success,
            payload,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            status: ToolCallStatus::Error,
            payload: json!({ "message": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolCallStatus::Success
    }
}

/// Schema-described function the model may ask to invoke. Loaded once at
/// startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub parameters: Value,
}

/// Vendor-neutral result of one completion call. Either side may be empty;
/// both empty is a valid "nothing to say, nothing to do" response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text_segments: Vec<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Completion {
    pub fn text(&self) -> String {
        self.text_segments.join("\n")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let value = serde_json::to_value(MessageRole::Tool).expect("serialize role");
        assert_eq!(value, json!("tool"));
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let result = ToolCallResult::success("call-1", json!({"value": 42}));
        let message = ChatMessage::tool_result(&result);
        assert_eq!(message.role, MessageRole::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(message.content.as_deref(), Some(r#"{"value":42}"#));
    }

    #[test]
    fn error_result_wraps_message_payload() {
        let result = ToolCallResult::error("call-2", "unknown tool: mystery");
        assert_eq!(result.status, ToolCallStatus::Error);
        assert_eq!(result.payload, json!({"message": "unknown tool: mystery"}));
    }

    #[test]
    fn empty_completion_is_valid() {
        let completion = Completion::default();
        assert!(completion.text().is_empty());
        assert!(!completion.has_tool_calls());
    }
}
