//! Application configuration.
//!
//! Reads `config.yaml` and resolves `${VAR}` / `${VAR:-default}` references
//! against the environment before parsing, so secrets can stay out of the
//! file. Every section has defaults; a minimal file only needs the model
//! endpoint credentials and at least one principal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Env var holding an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "PROSPECT_AGENT_CONFIG";

const CONFIG_FILE_NAME: &str = "config.yaml";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config.yaml (set PROSPECT_AGENT_CONFIG or run from the project directory)")]
    NotFound,

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds between `:ping` frames on open streams.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Reconnect delay advertised to clients in the `retry:` frame.
    #[serde(default = "default_client_retry_ms")]
    pub client_retry_ms: u64,
    /// Write logs to `agent.log` in this directory instead of stdout.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            keepalive_secs: default_keepalive_secs(),
            client_retry_ms: default_client_retry_ms(),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| PathBuf::from(expand_tilde(d)))
    }
}

/// Completion service endpoint and model selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_base_url")]
    pub base_url: String,
    pub api_key: String,
    /// Model for the streaming agent loop and high-quality JSON tasks.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model for cheap JSON tasks (scoring).
    #[serde(default = "default_json_model")]
    pub json_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_json_temperature")]
    pub json_temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_max_text_call_recoveries")]
    pub max_text_call_recoveries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_text_call_recoveries: default_max_text_call_recoveries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_base_url")]
    pub base_url: String,
    /// Seconds between sourcing status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Polls before a sourcing job is reported as still running.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: default_max_polls(),
        }
    }
}

impl PlatformConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Markdown reader service; the target URL is appended as a path.
    #[serde(default = "default_reader_url")]
    pub reader_url: String,
    /// Optional reader key for higher rate limits.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Page text beyond this many characters is not summarized.
    #[serde(default = "default_max_page_chars")]
    pub max_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            reader_url: default_reader_url(),
            api_key: None,
            max_chars: default_max_page_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

/// One API caller. The bearer token itself is never stored, only its
/// SHA-256 hex digest.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    pub token_sha256: String,
    pub workspace_id: String,
    pub user_id: String,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub company_pitch: Option<String>,
    #[serde(default)]
    pub platform_api_key: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}
fn default_keepalive_secs() -> u64 {
    15
}
fn default_client_retry_ms() -> u64 {
    3_000
}
fn default_models_base_url() -> String {
    "https://api.mistral.ai/v1".into()
}
fn default_chat_model() -> String {
    "mistral-large-latest".into()
}
fn default_json_model() -> String {
    "mistral-small-latest".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_json_temperature() -> f32 {
    0.3
}
fn default_max_steps() -> u32 {
    5
}
fn default_max_text_call_recoveries() -> u32 {
    3
}
fn default_platform_base_url() -> String {
    "https://api.instantly.ai/api/v2".into()
}
fn default_poll_interval_secs() -> u64 {
    3
}
fn default_max_polls() -> u32 {
    40
}
fn default_reader_url() -> String {
    "https://r.jina.ai".into()
}
fn default_max_page_chars() -> usize {
    12_000
}
fn default_max_attempts() -> u32 {
    crate::retry::MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    crate::retry::RETRY_BASE_DELAY.as_millis() as u64
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// `PROSPECT_AGENT_CONFIG` wins; otherwise search upward from `start`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(expand_tilde(&explicit));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "PROSPECT_AGENT_CONFIG points to a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound)
}

/// Read, interpolate, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse config text (after env interpolation) and validate it.
pub fn parse_config(raw: &str) -> Result<AppConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    let config: AppConfig = serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.models.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "models.api_key is empty".into(),
            });
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.max_steps must be at least 1".into(),
            });
        }
        for principal in &self.auth.principals {
            let digest = &principal.token_sha256;
            if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid {
                    reason: format!(
                        "auth principal for workspace '{}' has a malformed token_sha256",
                        principal.workspace_id
                    ),
                });
            }
        }
        if self.auth.principals.is_empty() {
            tracing::warn!("no auth principals configured; every chat request will be rejected");
        }
        Ok(())
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// `VAR` or `VAR:-default`. An empty variable counts as unset.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
