//! Exchange network endpoints (§6 external interfaces).

use serde::Deserialize;

use crate::core::book::{DEFAULT_CLOB_BASE_URL, DEFAULT_WS_URL};
use crate::core::catalog::gamma::DEFAULT_GAMMA_BASE_URL;

/// REST/WS endpoints for the target exchange. Defaults point at
/// Polymarket's public endpoints; overridable for a staging CLOB or a
/// recorded-fixture server under test.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_gamma_base_url")]
    pub gamma_base_url: String,
    #[serde(default = "default_clob_base_url")]
    pub clob_base_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_gamma_base_url() -> String {
    DEFAULT_GAMMA_BASE_URL.to_string()
}

fn default_clob_base_url() -> String {
    DEFAULT_CLOB_BASE_URL.to_string()
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { gamma_base_url: default_gamma_base_url(), clob_base_url: default_clob_base_url(), ws_url: default_ws_url() }
    }
}
