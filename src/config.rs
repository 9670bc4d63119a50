//! Layered configuration for leadflow.
//!
//! Settings are read from `leadflow.toml` and merged with environment
//! variables and CLI flags. Precedence, highest first:
//! 1. CLI arguments
//! 2. Environment variables (`LEADFLOW_*`)
//! 3. leadflow.toml
//! 4. Built-in defaults
//!
//! # Configuration File Format
//!
//! ```toml
//! [source]
//! base_url = "http://localhost:5000"
//! forgery_token = "csrf-token-value"
//!
//! [refresh]
//! interval_secs = 30
//!
//! [cache]
//! enabled = true
//! dir = "/var/cache/leadflow"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::FileCache;

/// Lead data source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Base URL of the CRM server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Anti-forgery token sent with stage change requests (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forgery_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            forgery_token: None,
        }
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSection {
    /// Seconds between background refresh passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Persistence cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Whether the board is mirrored to disk.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache directory (default: platform cache dir + "leadflow").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: None,
        }
    }
}

/// The complete leadflow.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadflowToml {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub refresh: RefreshSection,
    #[serde(default)]
    pub cache: CacheSection,
}

impl LeadflowToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse leadflow.toml")
    }

    /// Load from the given path, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize leadflow.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "leadflow.toml";

/// Unified configuration that combines LeadflowToml with runtime settings.
#[derive(Debug, Clone)]
pub struct LeadflowConfig {
    /// Path the toml was loaded from (or would be written to).
    pub config_path: PathBuf,
    /// Parsed leadflow.toml configuration.
    pub toml: LeadflowToml,
    /// CLI override: server base URL.
    pub cli_base_url: Option<String>,
    /// CLI override: disable the persistence cache.
    pub cli_no_cache: bool,
}

impl LeadflowConfig {
    /// Load from the given path (or `leadflow.toml` in the working
    /// directory), with no CLI overrides.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        let toml = LeadflowToml::load_or_default(&config_path)?;
        Ok(Self {
            config_path,
            toml,
            cli_base_url: None,
            cli_no_cache: false,
        })
    }

    /// Load with CLI overrides applied.
    pub fn with_cli_args(
        config_path: Option<PathBuf>,
        base_url: Option<String>,
        no_cache: bool,
    ) -> Result<Self> {
        let mut config = Self::new(config_path)?;
        config.cli_base_url = base_url;
        config.cli_no_cache = no_cache;
        Ok(config)
    }

    /// Server base URL (CLI → env → file → default).
    pub fn base_url(&self) -> String {
        self.cli_base_url
            .clone()
            .or_else(|| std::env::var("LEADFLOW_BASE_URL").ok())
            .unwrap_or_else(|| self.toml.source.base_url.clone())
    }

    /// Anti-forgery token for stage change requests (env → file).
    pub fn forgery_token(&self) -> Option<String> {
        std::env::var("LEADFLOW_FORGERY_TOKEN")
            .ok()
            .or_else(|| self.toml.source.forgery_token.clone())
    }

    /// Background refresh interval (env → file → default), floored at one
    /// second so a zero never spins the scheduler.
    pub fn refresh_interval(&self) -> Duration {
        let secs = std::env::var("LEADFLOW_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.toml.refresh.interval_secs);
        Duration::from_secs(secs.max(1))
    }

    /// Whether the persistence cache is on (CLI → env → file).
    pub fn cache_enabled(&self) -> bool {
        if self.cli_no_cache {
            return false;
        }
        if let Ok(env_val) = std::env::var("LEADFLOW_CACHE_ENABLED") {
            return env_val != "false";
        }
        self.toml.cache.enabled
    }

    /// Cache directory (env → file → platform default).
    pub fn cache_dir(&self) -> PathBuf {
        std::env::var("LEADFLOW_CACHE_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.toml.cache.dir.clone())
            .unwrap_or_else(FileCache::default_dir)
    }
}
