//! Two-Phase Executor timeouts (§6).

use std::time::Duration as StdDuration;

use serde::Deserialize;

use crate::core::executor::ExecutorConfig as CoreExecutorConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_leg_a_timeout_seconds")]
    pub leg_a_timeout_seconds: u64,
    #[serde(default = "default_leg_b_timeout_seconds")]
    pub leg_b_timeout_seconds: u64,
    #[serde(default = "default_max_unhedged_seconds")]
    pub max_unhedged_seconds: u64,
}

fn default_leg_a_timeout_seconds() -> u64 {
    12
}

fn default_leg_b_timeout_seconds() -> u64 {
    18
}

fn default_max_unhedged_seconds() -> u64 {
    25
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            leg_a_timeout_seconds: default_leg_a_timeout_seconds(),
            leg_b_timeout_seconds: default_leg_b_timeout_seconds(),
            max_unhedged_seconds: default_max_unhedged_seconds(),
        }
    }
}

impl From<ExecutorConfig> for CoreExecutorConfig {
    fn from(cfg: ExecutorConfig) -> Self {
        Self {
            leg_a_timeout: StdDuration::from_secs(cfg.leg_a_timeout_seconds),
            leg_b_timeout: StdDuration::from_secs(cfg.leg_b_timeout_seconds),
            max_unhedged: StdDuration::from_secs(cfg.max_unhedged_seconds),
        }
    }
}
