use crate::application::orchestrator::{Orchestrator, ToolSummary, TurnRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize stdio response: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct StdioTurnRequest {
    message: String,
    session_id: Option<String>,
    provider: Option<String>,
    dashboard_hint: Option<String>,
}

#[derive(Debug, Serialize)]
struct StdioTurnResponse {
    session_id: Option<String>,
    response: Option<String>,
    error: Option<String>,
    used_tools: bool,
    tool_summaries: Vec<ToolSummary>,
}

impl StdioTurnResponse {
    fn success(
        session_id: String,
        response: String,
        used_tools: bool,
        tool_summaries: Vec<ToolSummary>,
    ) -> Self {
        Self {
            session_id: Some(session_id),
            response: Some(response),
            error: None,
            used_tools,
            tool_summaries,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            response: None,
            error: Some(message.into()),
            used_tools: false,
            tool_summaries: Vec::new(),
        }
    }
}

pub async fn run(orchestrator: Arc<Orchestrator>) -> Result<(), StdioError> {
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received STDIO line");

        match serde_json::from_str::<StdioTurnRequest>(&line) {
            Ok(request) => {
                if request.message.trim().is_empty() {
                    write_response(
                        &mut stdout,
                        StdioTurnResponse::error("message cannot be empty"),
                    )
                    .await?;
                    continue;
                }

                info!("Processing STDIO turn request");
                let outcome = orchestrator
                    .process_turn(TurnRequest {
                        session_id: request.session_id,
                        user_text: request.message,
                        provider: request.provider,
                        dashboard_hint: request.dashboard_hint,
                    })
                    .await;

                match outcome {
                    Ok(outcome) => {
                        write_response(
                            &mut stdout,
                            StdioTurnResponse::success(
                                outcome.session_id,
                                outcome.response_text,
                                outcome.used_tools,
                                outcome.tool_summaries,
                            ),
                        )
                        .await?;
                    }
                    Err(err) => {
                        error!(%err, "Turn processing failed via STDIO");
                        write_response(&mut stdout, StdioTurnResponse::error(err.user_message()))
                            .await?;
                    }
                }
            }
            Err(err) => {
                error!(%err, "Failed to parse STDIO input line");
                write_response(
                    &mut stdout,
                    StdioTurnResponse::error(format!("invalid JSON input: {err}")),
                )
                .await?;
            }
        }
    }

    stdout.flush().await?;
    Ok(())
}

async fn write_response(
    stdout: &mut io::Stdout,
    response: StdioTurnResponse,
) -> Result<(), StdioError> {
    let mut payload = serde_json::to_vec(&response)?;
    payload.push(b'\n');
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}
