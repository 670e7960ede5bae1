//! Risk Register limits (§6). `0` on either notional cap means unlimited.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::core::risk::RiskLimits as CoreRiskLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_open_brackets")]
    pub max_open_brackets: usize,
    #[serde(default = "default_notional_cap")]
    pub max_estimated_notional_per_bracket: Decimal,
    #[serde(default = "default_notional_cap")]
    pub daily_estimated_notional_cap: Decimal,
    #[serde(default = "default_trading_enabled")]
    pub trading_enabled: bool,
}

fn default_max_open_brackets() -> usize {
    2
}

fn default_notional_cap() -> Decimal {
    dec!(0)
}

fn default_trading_enabled() -> bool {
    false
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_open_brackets: default_max_open_brackets(),
            max_estimated_notional_per_bracket: default_notional_cap(),
            daily_estimated_notional_cap: default_notional_cap(),
            trading_enabled: default_trading_enabled(),
        }
    }
}

impl From<RiskConfig> for CoreRiskLimits {
    fn from(cfg: RiskConfig) -> Self {
        Self {
            max_open_brackets: cfg.max_open_brackets,
            max_estimated_notional_per_bracket: cfg.max_estimated_notional_per_bracket,
            daily_estimated_notional_cap: cfg.daily_estimated_notional_cap,
        }
    }
}
