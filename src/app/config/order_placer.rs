//! Order Placer caps and dry-run switch (§6).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::core::executor::OrderPlacerLimits as CoreOrderPlacerLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlacerConfig {
    #[serde(default = "default_max_order_notional")]
    pub max_order_notional: Decimal,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_max_order_notional() -> Decimal {
    dec!(0)
}

fn default_dry_run() -> bool {
    true
}

impl Default for OrderPlacerConfig {
    fn default() -> Self {
        Self { max_order_notional: default_max_order_notional(), dry_run: default_dry_run() }
    }
}

impl From<OrderPlacerConfig> for CoreOrderPlacerLimits {
    fn from(cfg: OrderPlacerConfig) -> Self {
        Self { max_order_notional: cfg.max_order_notional }
    }
}
