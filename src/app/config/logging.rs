//! Logging configuration and initialization (§10: dual human/JSON modes).

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), json: default_json() }
    }
}

impl LoggingConfig {
    /// Install the process-wide `tracing` subscriber. `RUST_LOG` overrides
    /// `level` when set; `--json-logs` (or `json: true` in config) overrides
    /// the text format regardless of terminal detection.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        if self.json {
            fmt().json().with_env_filter(filter).init();
        } else {
            fmt().with_env_filter(filter).init();
        }
    }
}
