use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/client.toml";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_LEGACY_MODEL: &str = "claude-2.1";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
You are a renewable-energy consultant. Your expertise covers solar, wind,
hydro, geothermal, biogas and other renewable sources: technology choices,
cost analysis and return-on-investment calculations, environmental impact,
policy and incentive frameworks, and market trends.

You have tools for fetching generation data, calculating project ROI,
creating hosted dashboards, looking up policies, and searching the renewable
energy database. Use a tool whenever it would ground your answer in data;
answer directly when it would not. When a dashboard was created, mention its
link so the user can open it.

Be helpful and concrete, and summarise key figures in lists when that makes
the next step clearer.
"#;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub system_prompt: String,
    pub max_output_tokens: u32,
    pub providers: Vec<ProviderSettings>,
    pub gateway: Option<GatewaySettings>,
}

/// One configured LLM vendor. `api_key` holds the resolved secret, not the
/// environment variable name it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub id: String,
    pub provider_type: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    system_prompt: Option<String>,
    max_output_tokens: Option<u32>,
    #[serde(default)]
    providers: Vec<RawProvider>,
    gateway: Option<RawGateway>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawProvider {
    id: String,
    #[serde(rename = "type", default)]
    provider_type: String,
    endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawGateway {
    url: String,
    client_id: Option<String>,
    /// Name of the environment variable holding the client secret.
    client_secret: Option<String>,
    timeout_secs: Option<u64>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; building configuration from environment");
                Ok(Self::from_env())
            }
            Err(other) => Err(other),
        }
    }

    /// Environment-only configuration: one provider per vendor whose API key
    /// variable is set, in openai → anthropic preference order.
    pub fn from_env() -> Self {
        let mut providers = Vec::new();

        if let Some(api_key) = non_empty_env("OPENAI_API_KEY") {
            providers.push(ProviderSettings {
                id: "openai".to_string(),
                provider_type: "openai".to_string(),
                endpoint: non_empty_env("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
                api_key: Some(api_key),
                model: non_empty_env("OPENAI_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            });
        }

        if let Some(api_key) = non_empty_env("ANTHROPIC_API_KEY") {
            providers.push(ProviderSettings {
                id: "anthropic".to_string(),
                provider_type: "anthropic".to_string(),
                endpoint: DEFAULT_ANTHROPIC_ENDPOINT.to_string(),
                api_key: Some(api_key),
                model: non_empty_env("ANTHROPIC_MODEL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            });
        }

        let gateway = non_empty_env("GATEWAY_URL").map(|url| GatewaySettings {
            url,
            client_id: non_empty_env("GATEWAY_CLIENT_ID"),
            client_secret: non_empty_env("GATEWAY_CLIENT_SECRET"),
            timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
        });

        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.trim().to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            providers,
            gateway,
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading client configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(AppConfig {
        system_prompt: parsed
            .system_prompt
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.trim().to_string()),
        max_output_tokens: parsed.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        providers: parsed
            .providers
            .into_iter()
            .map(ProviderSettings::from)
            .collect(),
        gateway: parsed.gateway.map(GatewaySettings::from),
    })
}

impl From<RawProvider> for ProviderSettings {
    fn from(raw: RawProvider) -> Self {
        let provider_type = if raw.provider_type.is_empty() {
            "openai".to_string()
        } else {
            raw.provider_type.to_lowercase()
        };
        let endpoint = raw.endpoint.unwrap_or_else(|| {
            match provider_type.as_str() {
                "anthropic" | "legacy" => DEFAULT_ANTHROPIC_ENDPOINT,
                _ => DEFAULT_OPENAI_ENDPOINT,
            }
            .to_string()
        });
        let model = raw.model.unwrap_or_else(|| {
            match provider_type.as_str() {
                "anthropic" => DEFAULT_ANTHROPIC_MODEL,
                "legacy" => DEFAULT_LEGACY_MODEL,
                _ => DEFAULT_OPENAI_MODEL,
            }
            .to_string()
        });
        let api_key = resolve_secret(&raw.id, raw.api_key.as_deref());

        Self {
            id: raw.id,
            provider_type,
            endpoint,
            api_key,
            model,
        }
    }
}

impl From<RawGateway> for GatewaySettings {
    fn from(raw: RawGateway) -> Self {
        let client_secret = resolve_secret("gateway", raw.client_secret.as_deref());
        Self {
            url: raw.url,
            client_id: raw.client_id,
            client_secret,
            timeout: Duration::from_secs(
                raw.timeout_secs.unwrap_or(DEFAULT_GATEWAY_TIMEOUT_SECS),
            ),
        }
    }
}

/// Resolve a secret from the environment variable named in the config file.
fn resolve_secret(owner: &str, spec: Option<&str>) -> Option<String> {
    let Some(raw) = spec.map(str::trim) else {
        return None;
    };
    if raw.is_empty() {
        return None;
    }
    match env::var(raw) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => {
            warn!(owner, env_var = raw, "Secret environment variable is empty");
            None
        }
        Err(err) => {
            warn!(owner, env_var = raw, %err, "Secret environment variable is not set");
            None
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_providers_and_gateway() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            r#"
max_output_tokens = 800

[[providers]]
id = "groq"
type = "openai"
endpoint = "https://api.groq.com/openai"
model = "llama-3.1-70b"

[[providers]]
id = "anthropic"
type = "anthropic"

[gateway]
url = "http://localhost:5002"
client_id = "greenwatt"
timeout_secs = 5
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.max_output_tokens, 800);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].id, "groq");
        assert_eq!(config.providers[0].endpoint, "https://api.groq.com/openai");
        assert_eq!(config.providers[0].model, "llama-3.1-70b");
        assert_eq!(config.providers[1].provider_type, "anthropic");
        assert_eq!(config.providers[1].endpoint, DEFAULT_ANTHROPIC_ENDPOINT);
        assert_eq!(config.providers[1].model, DEFAULT_ANTHROPIC_MODEL);

        let gateway = config.gateway.expect("gateway configured");
        assert_eq!(gateway.url, "http://localhost:5002");
        assert_eq!(gateway.client_id.as_deref(), Some("greenwatt"));
        assert_eq!(gateway.timeout, Duration::from_secs(5));
    }

    #[test]
    fn provider_defaults_fill_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            r#"
[[providers]]
id = "primary"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].provider_type, "openai");
        assert_eq!(config.providers[0].endpoint, DEFAULT_OPENAI_ENDPOINT);
        assert_eq!(config.providers[0].model, DEFAULT_OPENAI_MODEL);
        assert!(config.providers[0].api_key.is_none());
        assert!(config.gateway.is_none());
        assert_eq!(config.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
    }

    #[test]
    fn legacy_provider_defaults_to_anthropic_endpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            r#"
[[providers]]
id = "fallback"
type = "legacy"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.providers[0].endpoint, DEFAULT_ANTHROPIC_ENDPOINT);
        assert_eq!(config.providers[0].model, DEFAULT_LEGACY_MODEL);
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        fs::write(&path, "providers = \"not a table\"").expect("write config");

        match AppConfig::load(Some(&path)) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
