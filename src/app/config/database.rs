//! Persistence location (§10).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "bracket15.sqlite".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_path() }
    }
}
