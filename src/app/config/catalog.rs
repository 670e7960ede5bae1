//! Market Catalog tunables: tradeable window and refresh cadence (§6).

use serde::Deserialize;

use crate::core::catalog::{
    DEFAULT_BUCKET_OFFSETS, DEFAULT_NO_TRADE_TAIL_SECONDS, DEFAULT_TRADEABLE_MAX_MINUTES,
    DEFAULT_TRADEABLE_MIN_MINUTES,
};

const DEFAULT_CACHE_REFRESH_INTERVAL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_min_minutes")]
    pub tradeable_min_minutes: f64,
    #[serde(default = "default_max_minutes")]
    pub tradeable_max_minutes: f64,
    #[serde(default = "default_no_trade_tail_seconds")]
    pub no_trade_tail_seconds: f64,
    #[serde(default = "default_cache_refresh_interval_seconds")]
    pub cache_refresh_interval_seconds: u64,
    #[serde(default = "default_bucket_offsets")]
    pub bucket_offsets: Vec<i64>,
}

fn default_min_minutes() -> f64 {
    DEFAULT_TRADEABLE_MIN_MINUTES
}

fn default_max_minutes() -> f64 {
    DEFAULT_TRADEABLE_MAX_MINUTES
}

fn default_no_trade_tail_seconds() -> f64 {
    DEFAULT_NO_TRADE_TAIL_SECONDS
}

fn default_cache_refresh_interval_seconds() -> u64 {
    DEFAULT_CACHE_REFRESH_INTERVAL_SECONDS
}

fn default_bucket_offsets() -> Vec<i64> {
    DEFAULT_BUCKET_OFFSETS.to_vec()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            tradeable_min_minutes: default_min_minutes(),
            tradeable_max_minutes: default_max_minutes(),
            no_trade_tail_seconds: default_no_trade_tail_seconds(),
            cache_refresh_interval_seconds: default_cache_refresh_interval_seconds(),
            bucket_offsets: default_bucket_offsets(),
        }
    }
}
