mod application;
mod config;
mod domain;
mod infrastructure;

pub use application::{catalog, executor, orchestrator, session, stdio, synthetic};
pub use domain::types;
pub use infrastructure::{gateway, provider, server};

use catalog::ToolCatalog;
use clap::{Parser, ValueEnum};
use config::AppConfig;
use executor::ToolExecutor;
use gateway::{RemoteGateway, ToolBackend};
use orchestrator::{Orchestrator, TurnRequest, TurnSettings};
use serde_json::json;
use session::MemorySessionStore;
use std::error::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "greenwatt",
    version,
    about = "Renewable-energy consultant assistant with tool-calling LLM orchestration"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    dashboard: Option<String>,
    #[arg(long)]
    prompt_file: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Cli)]
    mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Cli,
    Stdio,
    Rest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting greenwatt");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, session = ?cli.session, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let app_config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration using default path or environment");
    }

    let providers = provider::build_providers(&app_config.providers);
    if providers.is_empty() {
        warn!("No AI provider initialized; turns will fail until one is configured");
    } else {
        info!(count = providers.len(), "Initialized AI providers");
    }

    let gateway_handle = connect_backend(&app_config).await;
    let backend = gateway_handle
        .clone()
        .map(|gateway| gateway as Arc<dyn ToolBackend>);
    let catalog = Arc::new(ToolCatalog::builtin());
    let executor = ToolExecutor::new(catalog.clone(), backend);
    let sessions = Arc::new(MemorySessionStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        providers,
        executor,
        catalog,
        sessions,
        TurnSettings {
            system_prompt: app_config.system_prompt.clone(),
            max_output_tokens: app_config.max_output_tokens,
        },
    ));

    info!(mode = ?cli.mode, "Running in selected mode");
    match cli.mode {
        RunMode::Cli => {
            let prompt = load_prompt(&cli)?;
            info!("Dispatching single turn via CLI mode");
            let outcome = orchestrator
                .process_turn(TurnRequest {
                    session_id: cli.session.clone(),
                    user_text: prompt,
                    provider: cli.provider.clone(),
                    dashboard_hint: cli.dashboard.clone(),
                })
                .await
                .map_err(|err| err.user_message())?;

            let output = json!({
                "session_id": outcome.session_id,
                "response": outcome.response_text,
                "used_tools": outcome.used_tools,
                "tool_summaries": outcome.tool_summaries,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Stdio => {
            info!("Entering STDIO mode; awaiting JSON line input");
            stdio::run(orchestrator.clone()).await?;
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(orchestrator.clone(), gateway_handle.clone(), cli.rest_addr).await?;
        }
    }
    info!("Execution finished");
    Ok(())
}

/// Probe the tool gateway once at startup. An unreachable or unconfigured
/// gateway puts the whole session into mock mode rather than failing later,
/// turn by turn.
async fn connect_backend(config: &AppConfig) -> Option<Arc<RemoteGateway>> {
    let Some(settings) = &config.gateway else {
        info!("No tool gateway configured; synthetic data will be used");
        return None;
    };

    let gateway = RemoteGateway::new(settings);
    if !gateway.health_check().await {
        warn!(url = settings.url.as_str(), "Tool gateway is unreachable; falling back to synthetic data");
        return None;
    }

    if settings.client_id.is_some() && settings.client_secret.is_some() {
        match gateway.acquire_credential().await {
            Ok(_) => info!("Tool gateway credential acquired"),
            Err(err) => warn!(%err, "Could not acquire gateway credential; continuing unauthenticated"),
        }
    }

    info!(url = settings.url.as_str(), "Tool gateway is healthy");
    Some(Arc::new(gateway))
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path, "Loading prompt from file");
        let content = fs::read_to_string(path)?;
        return Ok(content.trim().to_string());
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        return Ok(cli.prompt.join(" ").trim().to_string());
    }

    warn!("Prompt not provided via arguments or file");
    Err("prompt required via arguments or --prompt-file".into())
}
