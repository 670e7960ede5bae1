//! Order book value types.
//!
//! Books are plain value types keyed by token; the aggregator hands out
//! clones rather than shared interior references, so there is no
//! shared-ownership handle to manage here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use super::TokenId;

/// Which side of the book an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// A single `(price, size)` level, exported from a [`MarketBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    #[must_use]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Notional value of this level, `price * size`.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Per-token order book snapshot.
///
/// Invariants maintained by every mutator: within each side, prices are
/// unique and sizes are strictly positive (a zero or negative size removes
/// the level); `best_bid < best_ask` whenever both sides are non-empty. An
/// update that would violate the cross-side invariant is dropped rather than
/// applied (see the crate's error-handling design for invariant violations).
#[derive(Debug, Clone)]
pub struct MarketBook {
    token_id: TokenId,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    last_update_ts: DateTime<Utc>,
}

impl MarketBook {
    #[must_use]
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_ts: Utc::now(),
        }
    }

    #[must_use]
    pub const fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    #[must_use]
    pub const fn last_update_ts(&self) -> DateTime<Utc> {
        self.last_update_ts
    }

    /// Replace the entire ladder for one side, as delivered by a `book`
    /// snapshot event. Levels with non-positive price or size are dropped.
    pub fn replace_side(&mut self, side: Side, levels: impl IntoIterator<Item = PriceLevel>, ts: DateTime<Utc>) {
        let map = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        map.clear();
        for level in levels {
            if level.price > Decimal::ZERO && level.size > Decimal::ZERO {
                map.insert(level.price, level.size);
            }
        }
        self.last_update_ts = ts;
    }

    /// Replace both sides at once (a full `book` event for this token).
    pub fn replace_book(
        &mut self,
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
        ts: DateTime<Utc>,
    ) {
        self.replace_side(Side::Bid, bids, ts);
        self.replace_side(Side::Ask, asks, ts);
    }

    /// Upsert a single `(side, price, size)` entry, as delivered by a
    /// `price_change` event. `size <= 0` removes the level. Drops (and logs)
    /// updates that would violate the cross-side ordering invariant or carry
    /// a non-positive price.
    pub fn apply_price_change(&mut self, side: Side, price: Decimal, size: Decimal, ts: DateTime<Utc>) {
        if price <= Decimal::ZERO {
            warn!(token_id = %self.token_id, %price, "dropping price_change with non-positive price");
            return;
        }

        if size <= Decimal::ZERO {
            match side {
                Side::Bid => self.bids.remove(&price),
                Side::Ask => self.asks.remove(&price),
            };
            self.last_update_ts = ts;
            return;
        }

        let would_cross = match side {
            Side::Bid => self.asks.keys().next().is_some_and(|&best_ask| price >= best_ask),
            Side::Ask => self.bids.keys().next_back().is_some_and(|&best_bid| price <= best_bid),
        };
        if would_cross {
            warn!(token_id = %self.token_id, ?side, %price, "dropping price_change that would cross the book");
            return;
        }

        match side {
            Side::Bid => self.bids.insert(price, size),
            Side::Ask => self.asks.insert(price, size),
        };
        self.last_update_ts = ts;
    }

    /// Bid levels sorted descending by price.
    #[must_use]
    pub fn bid_levels(&self) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .map(|(&price, &size)| PriceLevel::new(price, size))
            .collect()
    }

    /// Ask levels sorted ascending by price.
    #[must_use]
    pub fn ask_levels(&self) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .map(|(&price, &size)| PriceLevel::new(price, size))
            .collect()
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.iter().next_back().map(|(&p, &s)| PriceLevel::new(p, s))
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.iter().next().map(|(&p, &s)| PriceLevel::new(p, s))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Bid-ask spread, or `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

/// Both sides of a bracket, assembled on demand for evaluation.
#[derive(Debug, Clone)]
pub struct BracketBooks {
    pub up_book: MarketBook,
    pub down_book: MarketBook,
    pub taken_at: DateTime<Utc>,
}

impl BracketBooks {
    #[must_use]
    pub const fn new(up_book: MarketBook, down_book: MarketBook, taken_at: DateTime<Utc>) -> Self {
        Self { up_book, down_book, taken_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> MarketBook {
        MarketBook::new(TokenId::new("t1"))
    }

    #[test]
    fn replace_book_sorts_and_filters_zero_levels() {
        let mut b = book();
        let ts = Utc::now();
        b.replace_book(
            [PriceLevel::new(dec!(0.4), dec!(10)), PriceLevel::new(dec!(0.0), dec!(5))],
            [PriceLevel::new(dec!(0.6), dec!(10)), PriceLevel::new(dec!(0.7), dec!(-1))],
            ts,
        );
        assert_eq!(b.bid_levels(), vec![PriceLevel::new(dec!(0.4), dec!(10))]);
        assert_eq!(b.ask_levels(), vec![PriceLevel::new(dec!(0.6), dec!(10))]);
    }

    #[test]
    fn apply_price_change_upserts_and_removes() {
        let mut b = book();
        let ts = Utc::now();
        b.apply_price_change(Side::Bid, dec!(0.4), dec!(10), ts);
        b.apply_price_change(Side::Bid, dec!(0.41), dec!(5), ts);
        assert_eq!(b.best_bid(), Some(PriceLevel::new(dec!(0.41), dec!(5))));

        b.apply_price_change(Side::Bid, dec!(0.41), dec!(0), ts);
        assert_eq!(b.best_bid(), Some(PriceLevel::new(dec!(0.4), dec!(10))));
    }

    #[test]
    fn apply_price_change_drops_crossing_update() {
        let mut b = book();
        let ts = Utc::now();
        b.replace_book([PriceLevel::new(dec!(0.4), dec!(10))], [PriceLevel::new(dec!(0.6), dec!(10))], ts);
        // A bid at or above the best ask would cross the book; must be dropped.
        b.apply_price_change(Side::Bid, dec!(0.65), dec!(3), ts);
        assert_eq!(b.best_bid(), Some(PriceLevel::new(dec!(0.4), dec!(10))));
    }

    #[test]
    fn apply_price_change_drops_non_positive_price() {
        let mut b = book();
        let ts = Utc::now();
        b.apply_price_change(Side::Bid, dec!(-0.1), dec!(3), ts);
        assert!(b.best_bid().is_none());
    }

    // Scenario 6: streaming delta merge.
    #[test]
    fn scenario_streaming_delta_merge() {
        let mut b = book();
        let ts = Utc::now();
        b.replace_book([PriceLevel::new(dec!(0.4), dec!(10))], [PriceLevel::new(dec!(0.6), dec!(10))], ts);

        b.apply_price_change(Side::Bid, dec!(0.41), dec!(5), ts);
        b.apply_price_change(Side::Bid, dec!(0.4), dec!(0), ts);
        b.apply_price_change(Side::Ask, dec!(0.6), dec!(0), ts);
        b.apply_price_change(Side::Ask, dec!(0.55), dec!(8), ts);

        assert_eq!(b.bid_levels(), vec![PriceLevel::new(dec!(0.41), dec!(5))]);
        assert_eq!(b.ask_levels(), vec![PriceLevel::new(dec!(0.55), dec!(8))]);
    }

    // P3: exported levels are strictly monotonic with strictly positive sizes.
    #[test]
    fn property_book_monotonicity() {
        let mut b = book();
        let ts = Utc::now();
        for (side, price, size) in [
            (Side::Bid, dec!(0.30), dec!(1)),
            (Side::Bid, dec!(0.35), dec!(2)),
            (Side::Bid, dec!(0.10), dec!(3)),
            (Side::Ask, dec!(0.80), dec!(1)),
            (Side::Ask, dec!(0.75), dec!(2)),
            (Side::Ask, dec!(0.90), dec!(3)),
        ] {
            b.apply_price_change(side, price, size, ts);
        }

        let bids = b.bid_levels();
        for w in bids.windows(2) {
            assert!(w[0].price > w[1].price);
        }
        let asks = b.ask_levels();
        for w in asks.windows(2) {
            assert!(w[0].price < w[1].price);
        }
        for level in bids.iter().chain(asks.iter()) {
            assert!(level.size > Decimal::ZERO);
        }
    }
}
