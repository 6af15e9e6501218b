//! Tool execution with remote-first dispatch and synthetic fallback

use crate::application::catalog::ToolCatalog;
use crate::application::synthetic;
use crate::infrastructure::gateway::ToolBackend;
use crate::types::{ToolCallRequest, ToolCallResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves tool calls into results. Never returns an error and never
/// panics: unknown tools, remote failures, and malformed arguments all
/// become error-status results so the orchestration loop keeps moving.
pub struct ToolExecutor {
    catalog: Arc<ToolCatalog>,
    backend: Option<Arc<dyn ToolBackend>>,
}

impl ToolExecutor {
    /// `backend: None` is mock mode — every execution goes straight to the
    /// synthetic generators.
    pub fn new(catalog: Arc<ToolCatalog>, backend: Option<Arc<dyn ToolBackend>>) -> Self {
        Self { catalog, backend }
    }

    pub async fn execute(&self, request: &ToolCallRequest) -> ToolCallResult {
        if self.catalog.lookup(&request.name).is_none() {
            warn!(tool = %request.name, "Unknown tool requested by the model");
            return ToolCallResult::error(
                &request.id,
                format!("unknown tool: {}", request.name),
            );
        }

        if let Some(backend) = &self.backend {
            match backend.invoke(&request.name, request.arguments.clone()).await {
                Ok(payload) => {
                    info!(tool = %request.name, "Tool executed via remote backend");
                    return ToolCallResult::success(&request.id, payload);
                }
                Err(err) => {
                    warn!(
                        tool = %request.name,
                        %err,
                        "Remote tool execution failed; falling back to synthetic data"
                    );
                }
            }
        } else {
            debug!(tool = %request.name, "No tool backend configured; using synthetic data");
        }

        match synthetic::generate(&request.name, &request.arguments) {
            Ok(payload) => {
                info!(tool = %request.name, "Tool resolved with synthetic data");
                ToolCallResult::success(&request.id, payload)
            }
            Err(err) => {
                warn!(tool = %request.name, %err, "Synthetic generation failed");
                ToolCallResult::error(&request.id, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gateway::RemoteError;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct FailingBackend;

    #[async_trait]
    impl ToolBackend for FailingBackend {
        async fn invoke(&self, _tool: &str, _arguments: Value) -> Result<Value, RemoteError> {
            Err(RemoteError::Timeout {
                path: "/api/tool".to_string(),
            })
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl ToolBackend for EchoBackend {
        async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, RemoteError> {
            Ok(json!({"status": "success", "tool": tool, "echo": arguments}))
        }
    }

    fn request(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn unknown_tool_yields_identical_error_shapes() {
        let executor = ToolExecutor::new(Arc::new(ToolCatalog::builtin()), None);
        let req = request("imaginary_tool", json!({}));

        let first = executor.execute(&req).await;
        let second = executor.execute(&req).await;

        assert!(!first.is_success());
        assert_eq!(first, second);
        assert_eq!(
            first.payload,
            json!({"message": "unknown tool: imaginary_tool"})
        );
    }

    #[tokio::test]
    async fn remote_success_is_wrapped_as_is() {
        let executor = ToolExecutor::new(
            Arc::new(ToolCatalog::builtin()),
            Some(Arc::new(EchoBackend)),
        );
        let result = executor
            .execute(&request("fetch_renewable_data", json!({"energy_type": "wind"})))
            .await;
        assert!(result.is_success());
        assert_eq!(result.payload["echo"], json!({"energy_type": "wind"}));
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_synthetic_data() {
        let executor = ToolExecutor::new(
            Arc::new(ToolCatalog::builtin()),
            Some(Arc::new(FailingBackend)),
        );
        let result = executor
            .execute(&request("fetch_renewable_data", json!({"energy_type": "solar"})))
            .await;
        assert!(result.is_success());
        assert_eq!(result.payload["energy_type"], json!("solar"));
        assert!(result.payload["data"]["generation"].is_array());
    }

    #[tokio::test]
    async fn malformed_arguments_degrade_to_an_error_result() {
        let executor = ToolExecutor::new(Arc::new(ToolCatalog::builtin()), None);
        let result = executor
            .execute(&request("calculate_roi", json!({"project_type": "solar"})))
            .await;
        assert!(!result.is_success());
        assert!(
            result.payload["message"]
                .as_str()
                .expect("message")
                .contains("invalid arguments")
        );
    }
}
