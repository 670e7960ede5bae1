//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file, then overridden with
//! environment variables for values that should never live in a checked-in
//! file (trading kill switch, private key material for [`crate::core::executor`]
//! order placers).

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};

mod catalog;
mod database;
mod evaluator;
mod executor;
mod logging;
mod network;
mod order_placer;
mod risk;
mod scanner;

pub use catalog::CatalogConfig;
pub use database::DatabaseConfig;
pub use evaluator::EvaluatorConfig;
pub use executor::ExecutorConfig;
pub use logging::LoggingConfig;
pub use network::NetworkConfig;
pub use order_placer::OrderPlacerConfig;
pub use risk::RiskConfig;
pub use scanner::ScannerConfig;

/// Top-level application configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub order_placer: OrderPlacerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load from a TOML file at `path`, then apply environment overrides.
    ///
    /// `TRADING_ENABLED` and `DRY_RUN`, when set, win over whatever the file
    /// says — so an operator can flip the kill switch from the process
    /// environment (systemd unit, shell export) without editing a file on
    /// disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;

        let mut config: Self = toml::from_str(&content).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;

        if let Ok(raw) = std::env::var("TRADING_ENABLED") {
            config.risk.trading_enabled = parse_bool_env("TRADING_ENABLED", &raw)?;
        }
        if let Ok(raw) = std::env::var("DRY_RUN") {
            config.order_placer.dry_run = parse_bool_env("DRY_RUN", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.network.gamma_base_url.is_empty() {
            return Err(Error::Config("network.gamma_base_url must not be empty".into()));
        }
        if self.network.clob_base_url.is_empty() {
            return Err(Error::Config("network.clob_base_url must not be empty".into()));
        }
        if self.network.ws_url.is_empty() {
            return Err(Error::Config("network.ws_url must not be empty".into()));
        }
        if self.catalog.tradeable_min_minutes >= self.catalog.tradeable_max_minutes {
            return Err(Error::Config("catalog.tradeable_min_minutes must be < tradeable_max_minutes".into()));
        }
        if self.catalog.cache_refresh_interval_seconds == 0 {
            return Err(Error::Config("catalog.cache_refresh_interval_seconds must be > 0".into()));
        }
        if self.evaluator.max_spread <= Decimal::ZERO || self.evaluator.max_spread >= Decimal::ONE {
            return Err(Error::Config("evaluator.max_spread must be between 0 and 1".into()));
        }
        if self.evaluator.max_position_notional <= Decimal::ZERO {
            return Err(Error::Config("evaluator.max_position_notional must be > 0".into()));
        }
        if self.executor.leg_a_timeout_seconds == 0 || self.executor.leg_b_timeout_seconds == 0 {
            return Err(Error::Config("executor leg timeouts must be > 0".into()));
        }
        if self.risk.max_open_brackets == 0 {
            return Err(Error::Config("risk.max_open_brackets must be > 0".into()));
        }
        if self.database.path.is_empty() {
            return Err(Error::Config("database.path must not be empty".into()));
        }
        Ok(())
    }

    /// Initialize the process-wide `tracing` subscriber with the configured
    /// level and format.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn parse_bool_env(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{name}: cannot parse {other:?} as a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_tradeable_window() {
        let mut config = Config::default();
        config.catalog.tradeable_min_minutes = 10.0;
        config.catalog.tradeable_max_minutes = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_max_spread_outside_unit_interval() {
        let mut config = Config::default();
        config.evaluator.max_spread = Decimal::ONE;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_leg_timeout() {
        let mut config = Config::default();
        config.executor.leg_a_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_database_path() {
        let mut config = Config::default();
        config.database.path.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_bool_env_accepts_common_spellings() {
        assert!(parse_bool_env("X", "true").unwrap());
        assert!(parse_bool_env("X", "1").unwrap());
        assert!(!parse_bool_env("X", "off").unwrap());
        assert!(parse_bool_env("X", "maybe").is_err());
    }

    #[test]
    fn load_reports_a_missing_file() {
        let err = Config::load("/no/such/config.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
