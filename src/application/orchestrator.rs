//! The per-turn control loop: provider selection, completion with fallback,
//! in-order tool dispatch, and answer assembly.

use crate::application::catalog::ToolCatalog;
use crate::application::executor::ToolExecutor;
use crate::application::session::SessionStore;
use crate::infrastructure::provider::{
    CompletionRequest, ProviderError, ProviderHandle,
};
use crate::types::{ChatMessage, Completion, MessageRole, ToolDefinition};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const APOLOGY_NOTE: &str =
    "I could not reach an AI provider for a final summary, so the tool results above are reported directly.";

#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub session_id: Option<String>,
    pub user_text: String,
    /// Preferred provider id; configuration order applies when absent or
    /// unknown.
    pub provider: Option<String>,
    /// Caller-side policy decision that this turn should produce a dashboard
    /// of the given type. The model still chooses the tool calls; the hint
    /// only nudges it.
    pub dashboard_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolSummary {
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub response_text: String,
    pub used_tools: bool,
    pub tool_summaries: Vec<ToolSummary>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("no AI provider is configured")]
    NoProviderAvailable,
    #[error("all configured AI providers failed")]
    AllProvidersFailed {
        #[source]
        last: ProviderError,
    },
}

impl TurnError {
    pub fn user_message(&self) -> String {
        match self {
            TurnError::NoProviderAvailable => {
                "No AI provider is configured. Set an API key for at least one provider.".to_string()
            }
            TurnError::AllProvidersFailed { last } => format!(
                "Every configured AI provider failed to answer. Last problem: {}",
                last.user_message()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub system_prompt: String,
    pub max_output_tokens: u32,
}

pub struct Orchestrator {
    providers: Vec<ProviderHandle>,
    executor: ToolExecutor,
    catalog: Arc<ToolCatalog>,
    sessions: Arc<dyn SessionStore>,
    settings: TurnSettings,
}

impl Orchestrator {
    pub fn new(
        providers: Vec<ProviderHandle>,
        executor: ToolExecutor,
        catalog: Arc<ToolCatalog>,
        sessions: Arc<dyn SessionStore>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            providers,
            executor,
            catalog,
            sessions,
            settings,
        }
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        self.catalog.list_definitions()
    }

    /// Run one user turn end to end. Tool-level failures degrade into
    /// error-status results; only the exhaustion of every configured
    /// provider on the first completion fails the turn.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome, TurnError> {
        if self.providers.is_empty() {
            return Err(TurnError::NoProviderAvailable);
        }

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let history = self.sessions.history(&session_id).await;
        debug!(
            session_id = session_id.as_str(),
            history_count = history.len(),
            "Preparing turn with prior history"
        );

        let mut system_text = self.settings.system_prompt.clone();
        if let Some(hint) = &request.dashboard_hint {
            system_text.push_str(&format!(
                "\n\nThe caller has requested a dashboard for this turn. Use the create_dashboard tool with dashboard_type '{hint}' once you have the data."
            ));
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(MessageRole::System, system_text));
        messages.extend(history);
        let user_message = ChatMessage::new(MessageRole::User, request.user_text.clone());
        messages.push(user_message.clone());

        // Turn-local additions are buffered here and committed in one append
        // at the end; an abandoned turn leaves no partial history behind.
        let mut turn_log = vec![user_message];

        let order = self.provider_order(request.provider.as_deref());
        let first = self.complete_with_fallback(&order, &messages).await?;

        let used_tools = first.has_tool_calls();
        let mut tool_summaries = Vec::new();
        let mut artifacts = Vec::new();
        let first_text = first.text();

        let mut response_text = if !used_tools {
            first_text
        } else {
            let mut assistant_request = ChatMessage::tool_request(first.tool_calls.clone());
            if !first_text.is_empty() {
                assistant_request.content = Some(first_text.clone());
            }
            messages.push(assistant_request.clone());
            turn_log.push(assistant_request);

            // Dispatch strictly in the order the provider returned the
            // calls; some vendors validate that tool responses are paired
            // in that order.
            for call in &first.tool_calls {
                info!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
                let result = self.executor.execute(call).await;
                tool_summaries.push(ToolSummary {
                    tool: call.name.clone(),
                    success: result.is_success(),
                    detail: summarize_payload(&result.payload),
                });
                if let Some(artifact) = extract_dashboard_artifact(&result.payload) {
                    artifacts.push(artifact);
                }
                let tool_message = ChatMessage::tool_result(&result);
                messages.push(tool_message.clone());
                turn_log.push(tool_message);
            }

            match self.complete_with_fallback(&order, &messages).await {
                Ok(second) => {
                    let second_text = second.text();
                    if second_text.trim().is_empty() {
                        compose_degraded(first_text, &tool_summaries, false)
                    } else {
                        second_text
                    }
                }
                Err(err) => {
                    warn!(
                        %err,
                        "Second completion failed on every provider; answering from tool results"
                    );
                    compose_degraded(first_text, &tool_summaries, true)
                }
            }
        };

        for artifact in &artifacts {
            response_text.push_str(&format!(
                "\n\nI've published an interactive dashboard for you: {}",
                artifact.url
            ));
            if let Some(snippet) = &artifact.embed_snippet {
                response_text.push_str(&format!("\nEmbed it with: {snippet}"));
            }
        }

        turn_log.push(ChatMessage::new(MessageRole::Assistant, response_text.clone()));
        self.sessions.append(&session_id, turn_log).await;
        info!(
            session_id = session_id.as_str(),
            used_tools,
            tool_count = tool_summaries.len(),
            "Turn completed"
        );

        Ok(TurnOutcome {
            session_id,
            response_text,
            used_tools,
            tool_summaries,
        })
    }

    /// Requested provider first when it exists, then the remaining providers
    /// in configuration order. An unknown request falls back to plain
    /// configuration order.
    fn provider_order(&self, requested: Option<&str>) -> Vec<&ProviderHandle> {
        if let Some(requested) = requested {
            if self.providers.iter().any(|handle| handle.id == requested) {
                let mut order: Vec<&ProviderHandle> = Vec::with_capacity(self.providers.len());
                order.extend(self.providers.iter().filter(|h| h.id == requested));
                order.extend(self.providers.iter().filter(|h| h.id != requested));
                return order;
            }
            warn!(
                requested,
                "Requested provider is not configured; using configuration order"
            );
        }
        self.providers.iter().collect()
    }

    /// Try each provider in order with the identical message list; the first
    /// success wins.
    async fn complete_with_fallback(
        &self,
        order: &[&ProviderHandle],
        messages: &[ChatMessage],
    ) -> Result<Completion, TurnError> {
        let mut last: Option<ProviderError> = None;
        for handle in order {
            let request = CompletionRequest {
                messages: messages.to_vec(),
                tools: self.catalog.list_definitions().to_vec(),
                max_output_tokens: self.settings.max_output_tokens,
            };
            match handle.client.complete(request).await {
                Ok(completion) => {
                    debug!(provider = handle.id.as_str(), "Completion succeeded");
                    return Ok(completion);
                }
                Err(err) => {
                    warn!(
                        provider = handle.id.as_str(),
                        %err,
                        "Provider call failed; trying next configured provider"
                    );
                    last = Some(err);
                }
            }
        }
        match last {
            Some(last) => Err(TurnError::AllProvidersFailed { last }),
            None => Err(TurnError::NoProviderAvailable),
        }
    }
}

struct DashboardArtifact {
    url: String,
    embed_snippet: Option<String>,
}

fn extract_dashboard_artifact(payload: &Value) -> Option<DashboardArtifact> {
    payload.get("dashboard_id")?;
    let url = payload
        .get("url")
        .or_else(|| payload.get("dashboard_url"))
        .and_then(Value::as_str)?;
    let embed_snippet = payload
        .get("embed_code")
        .or_else(|| payload.get("embed_snippet"))
        .and_then(Value::as_str)
        .map(String::from);
    Some(DashboardArtifact {
        url: url.to_string(),
        embed_snippet,
    })
}

fn summarize_payload(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Base answer when the second completion produced no usable text: keep the
/// first-call text and report the tool outcomes directly.
fn compose_degraded(base: String, summaries: &[ToolSummary], apologize: bool) -> String {
    let mut text = if base.trim().is_empty() {
        "Here is what I found with the available tools.".to_string()
    } else {
        base
    };
    for summary in summaries {
        let status = if summary.success { "succeeded" } else { "failed" };
        match &summary.detail {
            Some(detail) => {
                text.push_str(&format!("\n- {} {status}: {detail}", summary.tool));
            }
            None => text.push_str(&format!("\n- {} {status}", summary.tool)),
        }
    }
    if apologize {
        text.push_str(&format!("\n\n{APOLOGY_NOTE}"));
    }
    text
}
