use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// When true, error responses carry the underlying error detail.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request fetch timeout, independent of any surrounding transaction.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Recursion ceiling for comment trees; nodes beyond it are dropped.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_base_url() -> String {
    "https://reddit.com".to_string()
}
fn default_user_agent() -> String {
    "threadkeep-archive".to_string()
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_max_depth() -> usize {
    100
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.source.base_url.is_empty() {
        anyhow::bail!("source.base_url must not be empty");
    }

    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be >= 1");
    }

    if config.archive.max_depth == 0 {
        anyhow::bail!("archive.max_depth must be >= 1");
    }

    Ok(config)
}
