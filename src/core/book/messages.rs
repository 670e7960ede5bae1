//! Wire types for the exchange's public market-data WebSocket channel (§6).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::{PriceLevel, TokenId};

/// The first message sent after connecting, per §6.
#[derive(Debug, Serialize)]
pub struct SubscribeMessage {
    #[serde(rename = "type")]
    pub channel: &'static str,
    pub assets_ids: Vec<String>,
}

impl SubscribeMessage {
    #[must_use]
    pub fn new(asset_ids: impl IntoIterator<Item = String>) -> Self {
        Self { channel: "market", assets_ids: asset_ids.into_iter().collect() }
    }
}

#[derive(Debug, Deserialize)]
pub struct WirePriceLevel {
    pub price: String,
    pub size: String,
}

impl WirePriceLevel {
    fn parse(&self) -> Option<PriceLevel> {
        Some(PriceLevel::new(self.price.parse::<Decimal>().ok()?, self.size.parse::<Decimal>().ok()?))
    }
}

#[must_use]
pub fn parse_levels(levels: &[WirePriceLevel]) -> Vec<PriceLevel> {
    levels.iter().filter_map(WirePriceLevel::parse).collect()
}

/// An incoming market-channel event, tagged by `event_type` (§6).
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type")]
pub enum MarketEvent {
    #[serde(rename = "book")]
    Book(BookEvent),
    #[serde(rename = "price_change")]
    PriceChange(PriceChangeEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct BookEvent {
    pub asset_id: String,
    #[serde(default)]
    pub bids: Vec<WirePriceLevel>,
    #[serde(default)]
    pub asks: Vec<WirePriceLevel>,
    pub timestamp: Option<String>,
}

impl BookEvent {
    #[must_use]
    pub fn ts(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ms| DateTime::from_timestamp_millis(ms))
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceChangeEvent {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub price_changes: Vec<PriceChangeEntry>,
}

impl PriceChangeEvent {
    #[must_use]
    pub fn ts(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ms| DateTime::from_timestamp_millis(ms))
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceChangeEntry {
    pub asset_id: String,
    pub price: String,
    pub size: String,
    pub side: String,
}

impl PriceChangeEntry {
    #[must_use]
    pub fn token_id(&self) -> TokenId {
        TokenId::new(self.asset_id.clone())
    }

    #[must_use]
    pub fn side(&self) -> Option<crate::core::domain::Side> {
        match self.side.to_uppercase().as_str() {
            "BUY" => Some(crate::core::domain::Side::Bid),
            "SELL" => Some(crate::core::domain::Side::Ask),
            _ => None,
        }
    }

    #[must_use]
    pub fn price(&self) -> Option<Decimal> {
        self.price.parse().ok()
    }

    #[must_use]
    pub fn size(&self) -> Decimal {
        self.size.parse().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_event_parses_millis_timestamp() {
        let json = r#"{"event_type":"book","asset_id":"t1","bids":[],"asks":[],"timestamp":"1700000000000"}"#;
        let MarketEvent::Book(ev) = serde_json::from_str(json).unwrap() else { panic!("expected book") };
        assert_eq!(ev.asset_id, "t1");
        assert_eq!(ev.ts().timestamp(), 1_700_000_000);
    }

    #[test]
    fn price_change_entry_maps_side() {
        let entry = PriceChangeEntry { asset_id: "t1".into(), price: "0.4".into(), size: "5".into(), side: "buy".into() };
        assert_eq!(entry.side(), Some(crate::core::domain::Side::Bid));
    }

    #[test]
    fn unknown_event_type_falls_back() {
        let json = r#"{"event_type":"tick_size_change","foo":"bar"}"#;
        assert!(matches!(serde_json::from_str::<MarketEvent>(json).unwrap(), MarketEvent::Unknown));
    }
}
