//! Opportunity Evaluator thresholds (§6).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::core::evaluator::EvaluatorConfig as CoreEvaluatorConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_min_edge_cents")]
    pub min_edge_cents: Decimal,
    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,
    #[serde(default = "default_min_depth_notional")]
    pub min_depth_notional: Decimal,
    #[serde(default = "default_max_position_notional")]
    pub max_position_notional: Decimal,
}

fn default_min_edge_cents() -> Decimal {
    dec!(1.0)
}

fn default_max_spread() -> Decimal {
    dec!(0.03)
}

fn default_min_depth_notional() -> Decimal {
    dec!(50)
}

fn default_max_position_notional() -> Decimal {
    dec!(40)
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_edge_cents: default_min_edge_cents(),
            max_spread: default_max_spread(),
            min_depth_notional: default_min_depth_notional(),
            max_position_notional: default_max_position_notional(),
        }
    }
}

impl From<EvaluatorConfig> for CoreEvaluatorConfig {
    fn from(cfg: EvaluatorConfig) -> Self {
        Self {
            min_edge_cents: cfg.min_edge_cents,
            max_spread: cfg.max_spread,
            min_depth_notional: cfg.min_depth_notional,
            max_position_notional: cfg.max_position_notional,
        }
    }
}
