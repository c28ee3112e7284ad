//! Configuration loading and resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the backend base address
pub const ENV_API_BASE_URL: &str = "NARWATCH_API_BASE_URL";

/// Environment variable overriding the reconnection delay
pub const ENV_RECONNECT_DELAY_MS: &str = "NARWATCH_RECONNECT_DELAY_MS";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 4000;
pub const DEFAULT_NOTICE_TTL_MS: u64 = 4200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api_base_url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub notice_ttl_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Give up reconnecting after this many consecutive failures
    pub max_retries: Option<u32>,
    pub backoff: Option<BackoffConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Optional growth of the reconnection delay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Backend base address without a trailing slash
    pub api_base_url: String,
    pub reconnect_delay: Duration,
    pub notice_ttl: Duration,
    pub request_timeout: Duration,
    pub max_retries: Option<u32>,
    pub backoff: Option<BackoffConfig>,
    pub log_level: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            notice_ttl: Duration::from_millis(DEFAULT_NOTICE_TTL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: None,
            backoff: None,
            log_level: default_log_level(),
        }
    }
}

impl DashboardConfig {
    /// Resolve configuration from CLI, environment, TOML file and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = match &overrides.config_path {
            // An explicitly named file must exist
            Some(path) => load_toml_config(path)?,
            None => match default_config_path() {
                Some(path) => {
                    info!("Loading config from {}", path.display());
                    load_toml_config(&path)?
                }
                None => {
                    debug!("No config file found, using defaults");
                    TomlConfig::default()
                }
            },
        };

        Self::from_sources(overrides, toml_config)
    }

    /// Merge already-loaded TOML with CLI values and the environment
    pub fn from_sources(overrides: &ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = overrides
            .api_base_url
            .clone()
            .or_else(|| non_blank_env(ENV_API_BASE_URL))
            .or(toml_config.api_base_url)
            .unwrap_or(defaults.api_base_url);
        let api_base_url = normalize_base_url(&api_base_url)?;

        let env_delay = match non_blank_env(ENV_RECONNECT_DELAY_MS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("{} must be a whole number of milliseconds: {}", ENV_RECONNECT_DELAY_MS, e))
            })?),
            None => None,
        };
        let reconnect_delay = overrides
            .reconnect_delay_ms
            .or(env_delay)
            .or(toml_config.reconnect_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.reconnect_delay);

        if let Some(backoff) = &toml_config.backoff {
            if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
                return Err(Error::Config(format!(
                    "backoff.multiplier must be at least 1.0, got {}",
                    backoff.multiplier
                )));
            }
        }

        Ok(Self {
            api_base_url,
            reconnect_delay,
            notice_ttl: toml_config
                .notice_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.notice_ttl),
            request_timeout: toml_config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: toml_config.max_retries,
            backoff: toml_config.backoff,
            log_level: toml_config.logging.level,
        })
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// First existing config file for the platform, if any
///
/// Linux checks `~/.config/narwatch/config.toml` then `/etc/narwatch/config.toml`;
/// other platforms only check the user config directory.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("narwatch").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/narwatch/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "API base URL must start with http:// or https://, got {:?}",
            raw
        )));
    }
    Ok(trimmed.to_string())
}
