//! Thin REST façade over the orchestrator

use crate::application::orchestrator::{Orchestrator, ToolSummary, TurnRequest};
use crate::application::synthetic;
use crate::infrastructure::gateway::RemoteGateway;
use crate::types::ToolDefinition;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub(crate) struct ServerState {
    orchestrator: Arc<Orchestrator>,
    gateway: Option<Arc<RemoteGateway>>,
}

#[derive(OpenApi)]
#[openapi(
    paths(chat_handler, tools_handler, dashboard_create_handler, health_handler),
    components(schemas(
        RestChatRequest,
        RestChatResponse,
        ErrorResponse,
        ToolListResponse,
        DashboardCreateRequest,
        DashboardCreateResponse,
        ToolSummary,
        ToolDefinition
    )),
    tags(
        (name = "chat", description = "Conversational turns against the assistant"),
        (name = "tools", description = "Tool definitions advertised to the model"),
        (name = "dashboards", description = "Direct dashboard creation"),
        (name = "health", description = "Liveness probe")
    )
)]
struct ApiDoc;

pub async fn serve(
    orchestrator: Arc<Orchestrator>,
    gateway: Option<Arc<RemoteGateway>>,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(ServerState {
        orchestrator,
        gateway,
    });
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/chat", post(chat_handler))
        .route("/tools", get(tools_handler))
        .route("/dashboard/create", post(dashboard_create_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

#[derive(Debug, Deserialize, ToSchema)]
struct RestChatRequest {
    message: String,
    session_id: Option<String>,
    provider: Option<String>,
    /// Caller-side policy hint that this turn should produce a dashboard of
    /// the given type.
    dashboard_hint: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct RestChatResponse {
    session_id: String,
    response: String,
    used_tools: bool,
    tool_summaries: Vec<ToolSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = RestChatRequest,
    responses(
        (status = 200, description = "Turn processed", body = RestChatResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "No AI provider could answer", body = ErrorResponse)
    )
)]
async fn chat_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RestChatRequest>,
) -> Result<Json<RestChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        session = payload.session_id.as_deref(),
        provider = payload.provider.as_deref(),
        "Received /chat request"
    );

    if payload.message.trim().is_empty() {
        error!("Rejecting /chat request due to empty message");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "message cannot be empty".to_string(),
            }),
        ));
    }

    let outcome = state
        .orchestrator
        .process_turn(TurnRequest {
            session_id: payload.session_id,
            user_text: payload.message,
            provider: payload.provider,
            dashboard_hint: payload.dashboard_hint,
        })
        .await;

    match outcome {
        Ok(outcome) => {
            info!(
                session_id = outcome.session_id.as_str(),
                used_tools = outcome.used_tools,
                "Turn completed successfully"
            );
            Ok(Json(RestChatResponse {
                session_id: outcome.session_id,
                response: outcome.response_text,
                used_tools: outcome.used_tools,
                tool_summaries: outcome.tool_summaries,
            }))
        }
        Err(err) => {
            error!(%err, "Turn processing failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.user_message(),
                }),
            ))
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ToolListResponse {
    tools: Vec<ToolDefinition>,
}

#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    responses(
        (status = 200, description = "Available tool definitions", body = ToolListResponse)
    )
)]
async fn tools_handler(State(state): State<Arc<ServerState>>) -> Json<ToolListResponse> {
    let tools = state.orchestrator.tools().to_vec();
    debug!(tool_count = tools.len(), "Serving /tools request");
    Json(ToolListResponse { tools })
}

#[derive(Debug, Deserialize, ToSchema)]
struct DashboardCreateRequest {
    title: String,
    description: Option<String>,
    /// Pre-processed data to display. When absent, `query` is used to fetch
    /// data through the gateway.
    #[schema(value_type = Object)]
    data: Option<Value>,
    query: Option<String>,
    dashboard_type: Option<String>,
    #[schema(value_type = Object)]
    layout: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
struct DashboardCreateResponse {
    id: String,
    url: String,
    embed_snippet: Option<String>,
    /// "gateway" when the remote backend hosted it, "synthetic" otherwise.
    source: String,
}

#[utoipa::path(
    post,
    path = "/dashboard/create",
    tag = "dashboards",
    request_body = DashboardCreateRequest,
    responses(
        (status = 200, description = "Dashboard created", body = DashboardCreateResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
async fn dashboard_create_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<DashboardCreateRequest>,
) -> Result<Json<DashboardCreateResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "title cannot be empty".to_string(),
            }),
        ));
    }

    let description = payload
        .description
        .clone()
        .unwrap_or_else(|| format!("Dashboard generated for '{}'", payload.title));

    // Resolve the data to display: caller-supplied, gateway-fetched, or an
    // empty object when neither is available.
    let data = match (&payload.data, &payload.query, &state.gateway) {
        (Some(data), _, _) => data.clone(),
        (None, Some(query), Some(gateway)) => {
            match gateway
                .fetch_data(query, payload.dashboard_type.as_deref())
                .await
            {
                Ok(data) => data,
                Err(err) => {
                    warn!(%err, "Gateway data fetch failed; creating dashboard without data");
                    json!({})
                }
            }
        }
        _ => json!({}),
    };

    if let Some(gateway) = &state.gateway {
        match gateway
            .create_dashboard(&payload.title, &description, data.clone(), payload.layout.clone())
            .await
        {
            Ok(created) => {
                info!(dashboard_id = created.id.as_str(), "Dashboard created via gateway");
                return Ok(Json(DashboardCreateResponse {
                    id: created.id,
                    url: created.url,
                    embed_snippet: created.embed_snippet,
                    source: "gateway".to_string(),
                }));
            }
            Err(err) => {
                warn!(%err, "Gateway dashboard creation failed; falling back to local stub");
            }
        }
    }

    let stub = synthetic::generate(
        "create_dashboard",
        &json!({
            "dashboard_type": payload.dashboard_type,
            "title": payload.title,
            "description": description,
        }),
    )
    .unwrap_or_else(|_| json!({}));

    Ok(Json(DashboardCreateResponse {
        id: stub["dashboard_id"].as_str().unwrap_or_default().to_string(),
        url: stub["url"].as_str().unwrap_or_default().to_string(),
        embed_snippet: stub["embed_code"].as_str().map(String::from),
        source: "synthetic".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is alive"))
)]
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
