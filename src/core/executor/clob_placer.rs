//! Direct-exchange `OrderPlacer` backed by the CLOB REST API.
//!
//! Signing never happens here. [`OrderSigner`] is the seam: an
//! implementation holds whatever private-key material production trading
//! needs and hands back an already-signed order body; this module only
//! knows how to POST that body, poll for fill state, and cancel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::order_placer::{is_effectively_filled, OrderPlacerLimits, OrderSnapshot, OrderStatus, PlacedOrder};
use super::OrderPlacer;
use crate::core::domain::{Side, TokenId};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Produces a signed, ready-to-POST order body for one limit order.
///
/// Implementations own wallet/key material (EIP-712 order signing, API key
/// derivation) entirely outside this crate's core; `ClobOrderPlacer` treats
/// the returned value as an opaque JSON body.
#[async_trait]
pub trait OrderSigner: Send + Sync {
    async fn sign_order(&self, token_id: &TokenId, side: Side, price: Decimal, size: Decimal) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(alias = "orderID", alias = "orderId", alias = "id")]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OrderStateResponse {
    status: Option<String>,
    size: Option<String>,
    original_size: Option<String>,
    #[serde(alias = "size_matched", alias = "matched", alias = "filled", alias = "filled_size")]
    matched: Option<String>,
    #[serde(alias = "size_remaining")]
    remaining: Option<String>,
}

fn parse_decimal_field(raw: &Option<String>) -> Option<Decimal> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

/// Map the exchange's free-form status string to [`OrderStatus`], falling
/// back to numeric remaining/matched fields when the string is absent or
/// unrecognized (mirrors `_order_looks_filled` in the direct-execution
/// reference implementation).
fn interpret_order_state(body: &OrderStateResponse, target_size: Decimal) -> (OrderStatus, Decimal) {
    let matched = parse_decimal_field(&body.matched).unwrap_or(Decimal::ZERO);

    let status = match body.status.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("FILLED" | "EXECUTED") => OrderStatus::Filled,
        Some("CANCELED" | "CANCELLED") => OrderStatus::Canceled,
        Some("REJECTED") => OrderStatus::Rejected,
        Some("FAILED") => OrderStatus::Failed,
        _ => {
            if let Some(remaining) = parse_decimal_field(&body.remaining) {
                if remaining <= Decimal::ZERO {
                    OrderStatus::Filled
                } else if is_effectively_filled(matched, target_size) {
                    OrderStatus::Filled
                } else if matched > Decimal::ZERO {
                    OrderStatus::PartiallyFilled
                } else {
                    OrderStatus::Open
                }
            } else if is_effectively_filled(matched, target_size) {
                OrderStatus::Filled
            } else if matched > Decimal::ZERO {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::Open
            }
        }
    };

    (status, matched)
}

/// `OrderPlacer` that places real limit orders against a CLOB-style REST
/// API: `POST {base_url}/order`, `GET {base_url}/order/{id}`,
/// `DELETE {base_url}/order/{id}`.
pub struct ClobOrderPlacer {
    http: HttpClient,
    base_url: String,
    trading_enabled: bool,
    limits: OrderPlacerLimits,
    signer: Box<dyn OrderSigner>,
}

impl ClobOrderPlacer {
    #[must_use]
    pub fn new(base_url: impl Into<String>, trading_enabled: bool, limits: OrderPlacerLimits, signer: Box<dyn OrderSigner>) -> Self {
        Self { http: HttpClient::new(), base_url: base_url.into(), trading_enabled, limits, signer }
    }

    fn precheck(&self, estimated_notional: Decimal, dry_run: bool) -> Result<()> {
        if self.limits.max_order_notional > Decimal::ZERO && estimated_notional > self.limits.max_order_notional {
            return Err(Error::RiskRefused(format!(
                "order notional {estimated_notional} exceeds per-order cap {}",
                self.limits.max_order_notional
            )));
        }
        if !dry_run && !self.trading_enabled {
            return Err(Error::RiskRefused("trading disabled and dry_run is false".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderPlacer for ClobOrderPlacer {
    async fn place_limit(
        &self,
        token_id: &TokenId,
        side: Side,
        price: Decimal,
        size: Decimal,
        estimated_notional: Decimal,
        dry_run: bool,
    ) -> Result<PlacedOrder> {
        self.precheck(estimated_notional, dry_run)?;

        if dry_run {
            let raw = format!(r#"{{"token_id":"{token_id}","side":"{side:?}","price":"{price}","size":"{size}","dry_run":true}}"#);
            return Ok(PlacedOrder { external_id: String::new(), raw });
        }

        let body = self.signer.sign_order(token_id, side, price, size).await?;
        let resp = self.http.post(format!("{}/order", self.base_url)).json(&body).send().await?;
        let raw = resp.text().await?;
        let parsed: OrderResponse = serde_json::from_str(&raw)?;
        let external_id = parsed.order_id.ok_or_else(|| Error::Execution(format!("order response missing order id: {raw}")))?;

        debug!(%external_id, %token_id, ?side, %price, %size, "order placed");
        Ok(PlacedOrder { external_id, raw })
    }

    async fn wait_until_filled(&self, external_id: &str, target_size: Decimal, timeout: Duration) -> Result<(bool, OrderStatus)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.get_order(external_id).await?;
            if snapshot.status.is_hard_failure() || is_effectively_filled(snapshot.filled_size, target_size) {
                return Ok((is_effectively_filled(snapshot.filled_size, target_size), snapshot.status));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok((false, snapshot.status));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn cancel(&self, external_id: &str) {
        if external_id.is_empty() {
            return;
        }
        if let Err(e) = self.http.delete(format!("{}/order/{external_id}", self.base_url)).send().await {
            warn!(%external_id, error = %e, "best-effort cancel failed");
        }
    }

    async fn get_order(&self, external_id: &str) -> Result<OrderSnapshot> {
        let resp = self.http.get(format!("{}/order/{external_id}", self.base_url)).send().await?;
        let body: OrderStateResponse = resp.json().await?;
        let target = parse_decimal_field(&body.size).or_else(|| parse_decimal_field(&body.original_size)).unwrap_or(Decimal::ZERO);
        let (status, filled_size) = interpret_order_state(&body, target);
        Ok(OrderSnapshot { status, filled_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interprets_explicit_filled_status() {
        let body = OrderStateResponse { status: Some("FILLED".into()), matched: Some("40".into()), ..Default::default() };
        let (status, filled) = interpret_order_state(&body, dec!(40));
        assert_eq!(status, OrderStatus::Filled);
        assert_eq!(filled, dec!(40));
    }

    #[test]
    fn interprets_hard_failure_status() {
        let body = OrderStateResponse { status: Some("CANCELLED".into()), ..Default::default() };
        let (status, _) = interpret_order_state(&body, dec!(40));
        assert_eq!(status, OrderStatus::Canceled);
    }

    #[test]
    fn falls_back_to_remaining_when_status_is_absent() {
        let body = OrderStateResponse { remaining: Some("0".into()), matched: Some("40".into()), ..Default::default() };
        let (status, _) = interpret_order_state(&body, dec!(40));
        assert_eq!(status, OrderStatus::Filled);
    }

    #[test]
    fn falls_back_to_matched_vs_target_when_remaining_absent() {
        let body = OrderStateResponse { matched: Some("20".into()), ..Default::default() };
        let (status, filled) = interpret_order_state(&body, dec!(40));
        assert_eq!(status, OrderStatus::PartiallyFilled);
        assert_eq!(filled, dec!(20));
    }

    #[test]
    fn no_progress_reports_open() {
        let body = OrderStateResponse::default();
        let (status, filled) = interpret_order_state(&body, dec!(40));
        assert_eq!(status, OrderStatus::Open);
        assert_eq!(filled, Decimal::ZERO);
    }
}
