use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest changefeed file accepted in one request.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default = "default_store_user")]
    pub user: String,
    /// Name of the environment variable holding the store password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Resolved from `password_env` by [`load_config`]; never read from TOML.
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_store_user() -> String {
    "elastic".to_string()
}
fn default_password_env() -> String {
    "ES_PASSWD".to_string()
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    10_000
}

/// What to do with a batch whose token does not name a table.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedAddressPolicy {
    /// Answer success and do nothing.
    #[default]
    Ignore,
    /// Answer with a `MalformedAddress` error.
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub unmatched_address: UnmatchedAddressPolicy,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            unmatched_address: UnmatchedAddressPolicy::default(),
            extension: default_extension(),
        }
    }
}

fn default_extension() -> String {
    "ndjson".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_index")]
    pub index: String,
    #[serde(default = "default_search_field")]
    pub field: String,
    #[serde(default = "default_fragment_size")]
    pub fragment_size: u32,
    #[serde(default = "default_fragments")]
    pub fragments: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: default_search_index(),
            field: default_search_field(),
            fragment_size: default_fragment_size(),
            fragments: default_fragments(),
        }
    }
}

fn default_search_index() -> String {
    "defaultdb".to_string()
}
fn default_search_field() -> String {
    "content".to_string()
}
fn default_fragment_size() -> u32 {
    80
}
fn default_fragments() -> u32 {
    4
}

impl Config {
    /// Source database settings, required by commands that write rows.
    pub fn source(&self) -> Result<&SourceConfig> {
        self.source
            .as_ref()
            .context("[source] section is required for this command")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.store.password = std::env::var(&config.store.password_env).ok();
    Ok(config)
}

/// Parses and validates configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url must not be empty");
    }

    // Validate retry
    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be >= 1");
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        anyhow::bail!("retry.base_delay_ms must be <= retry.max_delay_ms");
    }

    // Validate ingest
    let ext = config.ingest.extension.trim_start_matches('.');
    if ext.is_empty() || ext.contains('.') || ext.contains('/') {
        anyhow::bail!(
            "ingest.extension must be a single file extension, got '{}'",
            config.ingest.extension
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
bind = "127.0.0.1:3000"

[store]
url = "https://localhost:9200"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.store.user, "elastic");
        assert_eq!(cfg.store.password_env, "ES_PASSWD");
        assert!(cfg.store.password.is_none());
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.ingest.unmatched_address, UnmatchedAddressPolicy::Ignore);
        assert_eq!(cfg.ingest.extension, "ndjson");
        assert!(cfg.source.is_none());
        assert!(cfg.source().is_err());
    }

    #[test]
    fn reject_policy_parses() {
        let text = format!("{}\n[ingest]\nunmatched_address = \"reject\"\n", MINIMAL);
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.ingest.unmatched_address, UnmatchedAddressPolicy::Reject);
    }

    #[test]
    fn zero_attempts_rejected() {
        let text = format!("{}\n[retry]\nmax_attempts = 0\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn base_delay_above_max_rejected() {
        let text = format!("{}\n[retry]\nbase_delay_ms = 500\nmax_delay_ms = 100\n", MINIMAL);
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn password_is_not_read_from_toml() {
        let text = MINIMAL.replace(
            "url = \"https://localhost:9200\"",
            "url = \"https://localhost:9200\"\npassword = \"hunter2\"",
        );
        let cfg = parse_config(&text).unwrap();
        assert!(cfg.store.password.is_none());
    }
}
