//! Scanner tunables: tick cadence, event-driven mode, auto-execute threshold (§6).

use std::time::Duration as StdDuration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use super::catalog::CatalogConfig;
use crate::core::scanner::ScannerConfig as CoreScannerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_event_driven")]
    pub event_driven: bool,
    #[serde(default = "default_event_wait_seconds")]
    pub event_wait_seconds: u64,
    #[serde(default = "default_event_max_markets_per_tick")]
    pub event_max_markets_per_tick: usize,
    #[serde(default = "default_auto_execute_threshold_cents")]
    pub auto_execute_threshold_cents: Decimal,
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
}

fn default_event_driven() -> bool {
    false
}

fn default_event_wait_seconds() -> u64 {
    0
}

fn default_event_max_markets_per_tick() -> usize {
    8
}

fn default_auto_execute_threshold_cents() -> Decimal {
    dec!(2.0)
}

fn default_slippage() -> Decimal {
    dec!(0.01)
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            event_driven: default_event_driven(),
            event_wait_seconds: default_event_wait_seconds(),
            event_max_markets_per_tick: default_event_max_markets_per_tick(),
            auto_execute_threshold_cents: default_auto_execute_threshold_cents(),
            slippage: default_slippage(),
        }
    }
}

impl ScannerConfig {
    #[must_use]
    pub fn to_core(&self, catalog: &CatalogConfig) -> CoreScannerConfig {
        CoreScannerConfig {
            cache_refresh_interval: StdDuration::from_secs(catalog.cache_refresh_interval_seconds),
            event_driven: self.event_driven,
            event_wait: StdDuration::from_secs(self.event_wait_seconds),
            event_max_markets: self.event_max_markets_per_tick,
            auto_execute_threshold_cents: self.auto_execute_threshold_cents,
            slippage: self.slippage,
            bucket_offsets: catalog.bucket_offsets.clone(),
        }
    }
}
