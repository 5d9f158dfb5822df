use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to daily rolling files in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl LogConfig {
    /// Default log level.
    pub const DEFAULT_LEVEL: &'static str = "info";
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    LogConfig::DEFAULT_LEVEL.to_owned()
}
