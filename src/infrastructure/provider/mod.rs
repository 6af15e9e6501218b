//! Vendor-neutral completion plumbing and per-vendor client construction

mod anthropic;
mod legacy;
mod openai;

pub use anthropic::AnthropicClient;
pub use legacy::LegacyTextClient;
pub use openai::OpenAiClient;

use crate::config::ProviderSettings;
use crate::types::{ChatMessage, Completion, ToolDefinition};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Generous bound for generation-length-dependent vendor calls.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' rejected the request with status {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ProviderError {
    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ProviderError::MissingApiKey { provider } => {
                format!("The '{provider}' AI provider has no API key configured.")
            }
            ProviderError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to the '{provider}' AI provider.")
                } else if source.is_timeout() {
                    format!("The request to the '{provider}' AI provider timed out.")
                } else {
                    format!("A network error occurred while contacting the '{provider}' AI provider.")
                }
            }
            ProviderError::Api {
                provider, status, ..
            } => match StatusCode::from_u16(*status) {
                Ok(StatusCode::SERVICE_UNAVAILABLE) | Ok(StatusCode::BAD_GATEWAY) => {
                    format!("The '{provider}' AI provider is currently unavailable.")
                }
                _ => format!("The '{provider}' AI provider rejected the request ({status})."),
            },
            ProviderError::InvalidResponse { provider, .. } => {
                format!("The '{provider}' AI provider returned a response that could not be processed.")
            }
        }
    }
}

/// Construction-time failures. A provider that fails to initialize is
/// skipped; the process only gives up when no provider initializes at all.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("provider '{provider}' has no API key configured")]
    MissingCredentials { provider: String },
}

/// One vendor integration. Each implementation owns its wire format and
/// response parsing entirely; no business logic about tools lives here.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

pub struct ProviderHandle {
    pub id: String,
    pub client: Box<dyn ProviderClient>,
}

/// Build clients for every configured provider, in configuration order.
/// Mis-configured entries are logged and skipped.
pub fn build_providers(settings: &[ProviderSettings]) -> Vec<ProviderHandle> {
    let mut handles = Vec::new();
    for config in settings {
        match build_client(config) {
            Ok(client) => handles.push(ProviderHandle {
                id: config.id.clone(),
                client,
            }),
            Err(err) => {
                warn!(provider = config.id.as_str(), %err, "Skipping provider");
            }
        }
    }
    handles
}

fn build_client(config: &ProviderSettings) -> Result<Box<dyn ProviderClient>, ProviderInitError> {
    match config.provider_type.as_str() {
        "anthropic" => Ok(Box::new(AnthropicClient::from_settings(config)?)),
        "legacy" => Ok(Box::new(LegacyTextClient::from_settings(config)?)),
        _ => Ok(Box::new(OpenAiClient::from_settings(config)?)),
    }
}

/// Shared HTTP state for the vendor clients.
#[derive(Clone)]
pub(crate) struct HttpProviderBase {
    pub id: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub http: Client,
}

impl HttpProviderBase {
    pub fn from_settings(config: &ProviderSettings) -> Result<Self, ProviderInitError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderInitError::MissingCredentials {
                provider: config.id.clone(),
            })?;

        Ok(Self {
            id: config.id.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            http: Client::builder()
                .timeout(PROVIDER_TIMEOUT)
                .build()
                .unwrap_or_default(),
        })
    }

    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Send a JSON request and decode the JSON response, mapping transport
    /// failures, non-2xx statuses (with the vendor's message), and decode
    /// failures to the matching error variants.
    pub async fn send<Req, Res>(
        &self,
        request: reqwest::RequestBuilder,
        body: &Req,
    ) -> Result<Res, ProviderError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::network(&self.id, source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: self.id.clone(),
                status: status.as_u16(),
                message: extract_api_error(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|source| ProviderError::network(&self.id, source))
    }
}

/// Pull the human-readable message out of a vendor error body. Vendors wrap
/// it differently; fall back to the raw (truncated) body.
fn extract_api_error(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|err| err.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error details provided".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider_type: &str, api_key: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            id: "test".to_string(),
            provider_type: provider_type.to_string(),
            endpoint: "https://api.example.com".to_string(),
            api_key: api_key.map(String::from),
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn factory_skips_providers_without_credentials() {
        let configs = vec![settings("openai", None), settings("anthropic", Some("sk-1"))];
        let handles = build_providers(&configs);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].id, "test");
    }

    #[test]
    fn unknown_type_falls_back_to_openai_family() {
        let handles = build_providers(&[settings("groq", Some("sk-2"))]);
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn base_joins_urls_without_duplicate_slashes() {
        let base = HttpProviderBase::from_settings(&settings("openai", Some("sk-3")))
            .expect("base builds");
        assert_eq!(
            base.build_url("/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn api_error_message_is_extracted_from_common_shapes() {
        assert_eq!(
            extract_api_error(r#"{"error":{"message":"context window exceeded"}}"#),
            "context window exceeded"
        );
        assert_eq!(extract_api_error(r#"{"error":"bad model"}"#), "bad model");
        assert_eq!(extract_api_error("plain text"), "plain text");
        assert_eq!(extract_api_error(""), "no error details provided");
    }
}
