//! HTTP gateway to the remote tool-execution and data backend

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::GatewaySettings;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("gateway has no client credentials configured")]
    MissingCredentials,
    #[error("gateway rejected client credentials with status {status}")]
    Rejected { status: u16 },
    #[error("gateway credential request failed: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },
    #[error("gateway credential response did not contain an api_key")]
    MalformedResponse,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("gateway request to {path} timed out")]
    Timeout { path: String },
    #[error("gateway request to {path} failed: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("gateway returned status {status} for {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },
    #[error("gateway returned malformed JSON for {path}: {reason}")]
    InvalidJson { path: String, reason: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardInfo {
    #[serde(alias = "dashboard_id")]
    pub id: String,
    #[serde(alias = "dashboard_url")]
    pub url: String,
    #[serde(default, alias = "embed_code")]
    pub embed_snippet: Option<String>,
}

/// Transport seam between the tool executor and the gateway, so tests can
/// substitute the backend.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, RemoteError>;
}

pub struct RemoteGateway {
    http: Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    token: RwLock<Option<String>>,
}

impl RemoteGateway {
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            http: Client::builder()
                .timeout(settings.timeout)
                .build()
                .unwrap_or_default(),
            base_url: settings.url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token: RwLock::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Return the process-wide cached API key, exchanging the client
    /// credentials for one on first use.
    pub async fn acquire_credential(&self) -> Result<String, AuthError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_credential().await
    }

    /// Drop the cached token and acquire a fresh one. Holds the writer lock
    /// across the exchange so concurrent callers observe either the old or
    /// the new token, never a missing one.
    pub async fn refresh_credential(&self) -> Result<String, AuthError> {
        let mut guard = self.token.write().await;
        let token = self.request_api_key().await?;
        *guard = Some(token.clone());
        info!("Refreshed gateway API key");
        Ok(token)
    }

    async fn request_api_key(&self) -> Result<String, AuthError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret)
        else {
            return Err(AuthError::MissingCredentials);
        };

        let response = self
            .http
            .post(self.endpoint("/api/generate_key"))
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
            }))
            .send()
            .await
            .map_err(|source| AuthError::Network { source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: KeyResponse = response
            .json()
            .await
            .map_err(|_| AuthError::MalformedResponse)?;
        body.api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(AuthError::MalformedResponse)
    }

    /// Probe the backend. Never fails: any network error or unexpected body
    /// reads as "not healthy", which callers use to enter mock mode.
    pub async fn health_check(&self) -> bool {
        for path in ["/api/health", "/health"] {
            match self.http.get(self.endpoint(path)).send().await {
                Ok(response) if response.status().is_success() => {
                    let healthy = match response.json::<Value>().await {
                        Ok(body) => body
                            .get("status")
                            .and_then(Value::as_str)
                            .map(|status| status == "ok" || status == "healthy")
                            .unwrap_or(true),
                        Err(_) => false,
                    };
                    if healthy {
                        debug!(path, "Gateway health check passed");
                        return true;
                    }
                }
                Ok(response) => {
                    debug!(path, status = response.status().as_u16(), "Gateway health check failed");
                }
                Err(err) => {
                    debug!(path, %err, "Gateway health check request failed");
                }
            }
        }
        false
    }

    /// Execute a named tool remotely.
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, RemoteError> {
        self.post_json(
            "/api/tool",
            json!({ "tool": tool, "parameters": arguments }),
        )
        .await
    }

    /// Fetch processed data for a free-form query.
    pub async fn fetch_data(
        &self,
        query: &str,
        dashboard_hint: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.post_json(
            "/api/data/fetch",
            json!({
                "query": query,
                "dashboard_type": dashboard_hint,
                "format": "json",
            }),
        )
        .await
    }

    /// Create a hosted dashboard from processed data.
    pub async fn create_dashboard(
        &self,
        title: &str,
        description: &str,
        data: Value,
        layout: Option<Value>,
    ) -> Result<DashboardInfo, RemoteError> {
        let path = "/api/dashboards/create";
        let body = self
            .post_json(
                path,
                json!({
                    "title": title,
                    "description": description,
                    "data": data,
                    "layout": layout,
                }),
            )
            .await?;
        serde_json::from_value(body).map_err(|err| RemoteError::InvalidJson {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }

    /// POST with the cached bearer token. A 401 triggers exactly one
    /// credential refresh and a retry of the failing call; a second 401
    /// surfaces as a status error.
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, RemoteError> {
        let mut refreshed = false;
        loop {
            let token = self.token.read().await.clone();
            let mut request = self.http.post(self.endpoint(path)).json(&body);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|source| {
                if source.is_timeout() {
                    RemoteError::Timeout {
                        path: path.to_string(),
                    }
                } else {
                    RemoteError::Network {
                        path: path.to_string(),
                        source,
                    }
                }
            })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed && self.has_credentials() {
                refreshed = true;
                warn!(path, "Gateway returned 401; refreshing API key once");
                self.refresh_credential().await?;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Status {
                    path: path.to_string(),
                    status: status.as_u16(),
                    message: extract_error_message(&body),
                });
            }

            return response.json().await.map_err(|err| RemoteError::InvalidJson {
                path: path.to_string(),
                reason: err.to_string(),
            });
        }
    }
}

#[async_trait]
impl ToolBackend for RemoteGateway {
    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, RemoteError> {
        RemoteGateway::invoke(self, tool, arguments).await
    }
}

#[derive(Deserialize)]
struct KeyResponse {
    api_key: Option<String>,
}

/// Error bodies follow `{"status":"error","message":...}`; tolerate other
/// common wrappings and fall back to the truncated raw body.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
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
    use std::time::Duration;

    fn gateway() -> RemoteGateway {
        RemoteGateway::new(&GatewaySettings {
            url: "http://localhost:5002/".to_string(),
            client_id: Some("greenwatt".to_string()),
            client_secret: Some("secret".to_string()),
            timeout: Duration::from_secs(10),
        })
    }

    #[test]
    fn endpoint_joins_paths_correctly() {
        assert_eq!(
            gateway().endpoint("/api/tool"),
            "http://localhost:5002/api/tool"
        );
    }

    #[test]
    fn error_message_extraction_prefers_message_field() {
        assert_eq!(
            extract_error_message(r#"{"status":"error","message":"unknown tool: x"}"#),
            "unknown tool: x"
        );
        assert_eq!(extract_error_message(r#"{"error":"boom"}"#), "boom");
        assert_eq!(extract_error_message("  "), "no error details provided");
    }

    #[test]
    fn dashboard_info_accepts_server_field_names() {
        let info: DashboardInfo = serde_json::from_value(json!({
            "dashboard_id": "solar_farm_20240301",
            "dashboard_url": "/dashboards/solar_farm_20240301",
            "embed_code": "<iframe></iframe>"
        }))
        .expect("deserialize dashboard info");
        assert_eq!(info.id, "solar_farm_20240301");
        assert_eq!(info.url, "/dashboards/solar_farm_20240301");
        assert!(info.embed_snippet.is_some());
    }

    #[tokio::test]
    async fn acquire_without_credentials_is_an_auth_error() {
        let gateway = RemoteGateway::new(&GatewaySettings {
            url: "http://localhost:5002".to_string(),
            client_id: None,
            client_secret: None,
            timeout: Duration::from_secs(1),
        });
        match gateway.acquire_credential().await {
            Err(AuthError::MissingCredentials) => {}
            other => panic!("expected missing credentials, got {other:?}"),
        }
    }
}
