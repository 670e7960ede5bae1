//! Order Placer (§4.G) — the boundary between the core and exchange order
//! entry. Credentials and signing live entirely on the other side of this
//! trait; the core never sees a private key.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::core::domain::{Side, TokenId};
use crate::error::{Error, Result};

/// Terminal and non-terminal order states an exchange may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Failed,
}

impl OrderStatus {
    #[must_use]
    pub const fn is_hard_failure(self) -> bool {
        matches!(self, Self::Canceled | Self::Rejected | Self::Failed)
    }
}

/// The result of placing one order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub external_id: String,
    pub raw: String,
}

/// A point-in-time read of an order's fill progress.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub status: OrderStatus,
    pub filled_size: Decimal,
}

/// Places, confirms, and cancels limit orders against one exchange account.
///
/// Implementations must refuse live orders unless the process-wide
/// `trading_enabled` flag is true and `dry_run` is false, and must refuse
/// any order whose `estimated_notional` exceeds a configured per-order cap
/// (§4.G "hard pre-check").
#[async_trait]
pub trait OrderPlacer: Send + Sync {
    async fn place_limit(
        &self,
        token_id: &TokenId,
        side: Side,
        price: Decimal,
        size: Decimal,
        estimated_notional: Decimal,
        dry_run: bool,
    ) -> Result<PlacedOrder>;

    /// Poll until `target_size` (minus a small epsilon) is matched or
    /// `timeout` elapses. Returns `(filled, last_status)`.
    async fn wait_until_filled(&self, external_id: &str, target_size: Decimal, timeout: Duration) -> Result<(bool, OrderStatus)>;

    /// Best-effort cancellation; failures are not propagated.
    async fn cancel(&self, external_id: &str);

    async fn get_order(&self, external_id: &str) -> Result<OrderSnapshot>;
}

/// Tolerance below which a remaining size is treated as fully filled,
/// absorbing exchange-side rounding.
const FILL_EPSILON: Decimal = rust_decimal_macros::dec!(0.0001);

#[must_use]
pub fn is_effectively_filled(filled_size: Decimal, target_size: Decimal) -> bool {
    target_size - filled_size <= FILL_EPSILON
}

/// A per-order notional cap enforced before any order reaches the wire.
#[derive(Debug, Clone, Copy)]
pub struct OrderPlacerLimits {
    /// `0` means unlimited.
    pub max_order_notional: Decimal,
}

fn precheck(trading_enabled: bool, dry_run: bool, estimated_notional: Decimal, limits: OrderPlacerLimits) -> Result<()> {
    if limits.max_order_notional > Decimal::ZERO && estimated_notional > limits.max_order_notional {
        return Err(Error::RiskRefused(format!(
            "order notional {estimated_notional} exceeds per-order cap {}",
            limits.max_order_notional
        )));
    }
    if !dry_run && !trading_enabled {
        return Err(Error::RiskRefused("trading disabled and dry_run is false".into()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct SimulatedOrder {
    status: OrderStatus,
    filled_size: Decimal,
}

/// In-process placer used for `--dry-run`/backtest. Fills every order
/// immediately at the requested price with a deterministic synthetic ID, no
/// I/O involved. First-class backend, not a branch hidden in the executor
/// (§9 Design Notes).
pub struct SimulatedOrderPlacer {
    trading_enabled: bool,
    limits: OrderPlacerLimits,
    orders: Mutex<HashMap<String, SimulatedOrder>>,
    next_id: Mutex<u64>,
}

impl SimulatedOrderPlacer {
    #[must_use]
    pub fn new(trading_enabled: bool, limits: OrderPlacerLimits) -> Self {
        Self { trading_enabled, limits, orders: Mutex::new(HashMap::new()), next_id: Mutex::new(0) }
    }
}

#[async_trait]
impl OrderPlacer for SimulatedOrderPlacer {
    async fn place_limit(
        &self,
        token_id: &TokenId,
        side: Side,
        price: Decimal,
        size: Decimal,
        estimated_notional: Decimal,
        dry_run: bool,
    ) -> Result<PlacedOrder> {
        precheck(self.trading_enabled, dry_run, estimated_notional, self.limits)?;

        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("sim-{}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default(), *next)
        };

        self.orders.lock().insert(id.clone(), SimulatedOrder { status: OrderStatus::Filled, filled_size: size });

        let raw = format!(
            r#"{{"external_id":"{id}","token_id":"{token_id}","side":"{side:?}","price":"{price}","size":"{size}","simulated":true}}"#
        );
        Ok(PlacedOrder { external_id: id, raw })
    }

    async fn wait_until_filled(&self, external_id: &str, target_size: Decimal, _timeout: Duration) -> Result<(bool, OrderStatus)> {
        let order = self.orders.lock().get(external_id).cloned().ok_or_else(|| Error::Execution(format!("unknown simulated order {external_id}")))?;
        Ok((is_effectively_filled(order.filled_size, target_size), order.status))
    }

    async fn cancel(&self, external_id: &str) {
        if let Some(order) = self.orders.lock().get_mut(external_id) {
            order.status = OrderStatus::Canceled;
        }
    }

    async fn get_order(&self, external_id: &str) -> Result<OrderSnapshot> {
        let order = self.orders.lock().get(external_id).cloned().ok_or_else(|| Error::Execution(format!("unknown simulated order {external_id}")))?;
        Ok(OrderSnapshot { status: order.status, filled_size: order.filled_size })
    }
}

impl Clone for SimulatedOrder {
    fn clone(&self) -> Self {
        Self { status: self.status, filled_size: self.filled_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> OrderPlacerLimits {
        OrderPlacerLimits { max_order_notional: dec!(1000) }
    }

    #[tokio::test]
    async fn simulated_placer_fills_immediately() {
        let placer = SimulatedOrderPlacer::new(true, limits());
        let placed = placer.place_limit(&TokenId::new("up"), Side::Bid, dec!(0.45), dec!(40), dec!(18), false).await.unwrap();
        let (filled, status) = placer.wait_until_filled(&placed.external_id, dec!(40), Duration::from_secs(1)).await.unwrap();
        assert!(filled);
        assert_eq!(status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn simulated_placer_refuses_live_orders_when_trading_disabled() {
        let placer = SimulatedOrderPlacer::new(false, limits());
        let err = placer.place_limit(&TokenId::new("up"), Side::Bid, dec!(0.45), dec!(40), dec!(18), false).await.unwrap_err();
        assert!(matches!(err, Error::RiskRefused(_)));
    }

    #[tokio::test]
    async fn simulated_placer_allows_dry_run_even_when_trading_disabled() {
        let placer = SimulatedOrderPlacer::new(false, limits());
        let placed = placer.place_limit(&TokenId::new("up"), Side::Bid, dec!(0.45), dec!(40), dec!(18), true).await.unwrap();
        assert!(!placed.external_id.is_empty());
    }

    #[tokio::test]
    async fn simulated_placer_refuses_orders_over_the_per_order_cap() {
        let placer = SimulatedOrderPlacer::new(true, OrderPlacerLimits { max_order_notional: dec!(10) });
        let err = placer.place_limit(&TokenId::new("up"), Side::Bid, dec!(0.45), dec!(40), dec!(18), false).await.unwrap_err();
        assert!(matches!(err, Error::RiskRefused(_)));
    }

    #[test]
    fn effectively_filled_absorbs_epsilon_rounding() {
        assert!(is_effectively_filled(dec!(39.9999), dec!(40)));
        assert!(!is_effectively_filled(dec!(39.9), dec!(40)));
    }
}
