//! Engine configuration
//!
//! Everything here is operational tuning: log output and dedup-filter
//! sizing. The money scale is a crate constant and deliberately NOT
//! configurable — changing it would silently re-round every balance.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, loadable from YAML. Every field has a
/// default, so an empty document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        serde_yaml::from_str(&raw).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_yaml::Error),
}

/// Log output settings, consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// `"hourly"`, `"daily"` or anything else for a single file.
    #[serde(default = "default_rotation")]
    pub rotation: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of text.
    #[serde(default)]
    pub use_json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            rotation: default_rotation(),
            log_level: default_log_level(),
            use_json: false,
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file() -> String {
    "spotmatch.log".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sizing for the credit/debit/order dedup bloom filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Expected number of ids per filter.
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
    /// Target false-positive rate at capacity. False positives reject a
    /// fresh id with `Conflicted`; callers retry with a new id.
    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
            false_positive_rate: default_false_positive_rate(),
        }
    }
}

fn default_dedup_capacity() -> usize {
    1_000_000
}

fn default_false_positive_rate() -> f64 {
    1e-6
}
