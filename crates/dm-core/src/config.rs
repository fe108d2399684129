//! Session tuning configuration.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. Environment (`DIAGMON_POLL_TIMEOUT_MS`, `DIAGMON_STOP_GRACE_MS`)
//! 4. CLI flags (applied by the caller)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_STOP_GRACE_MS: u64 = 2000;
pub const DEFAULT_STDERR_LIMIT_BYTES: usize = 64 * 1024;
pub const DEFAULT_CONTEXT_RADIUS: usize = 2;
pub const DEFAULT_MAX_SAMPLES: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Tunables for supervision and harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Upper bound on a single `wait` call in the poll loop.
    pub poll_timeout_ms: u64,

    /// Grace period between SIGTERM and SIGKILL on stop.
    pub stop_grace_ms: u64,

    /// Maximum stderr bytes retained per process (oldest bytes dropped).
    pub stderr_limit_bytes: usize,

    /// Lines shown on each side of a failing line in decode diagnostics.
    pub context_radius: usize,

    /// Decode sources concurrently during harvest.
    pub parallel_harvest: bool,

    /// Sample count passed to periodic samplers.
    pub max_samples: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            stderr_limit_bytes: DEFAULT_STDERR_LIMIT_BYTES,
            context_radius: DEFAULT_CONTEXT_RADIUS,
            parallel_harvest: false,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl MonitorConfig {
    /// Load defaults, then the optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(val) = lookup("DIAGMON_POLL_TIMEOUT_MS") {
            self.poll_timeout_ms = parse_env_u64("DIAGMON_POLL_TIMEOUT_MS", &val)?;
        }
        if let Some(val) = lookup("DIAGMON_STOP_GRACE_MS") {
            self.stop_grace_ms = parse_env_u64("DIAGMON_STOP_GRACE_MS", &val)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.stderr_limit_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "stderr_limit_bytes",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_samples == 0 {
            return Err(ConfigError::Invalid {
                key: "max_samples",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

fn parse_env_u64(key: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        message: format!("expected an integer, got {:?}", val),
    })
}
