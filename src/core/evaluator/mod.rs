//! Opportunity Evaluator.
//!
//! A pure function over a bracket's two books: computes best-ask sum,
//! spread, depth-walked fill cost, and the optimal size under the
//! configured caps. Holds no state and performs no I/O; every input is a
//! borrowed, short-lived view.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::domain::{BracketBooks, PriceLevel};

/// Thresholds the evaluator checks an opportunity against.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    pub min_edge_cents: Decimal,
    pub max_spread: Decimal,
    pub min_depth_notional: Decimal,
    pub max_position_notional: Decimal,
}

/// Why a bracket was rejected, or that it wasn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EdgeTooSmall,
    SpreadTooWide,
    DepthInsufficient,
    Unfillable,
    BookEmpty,
}

/// The evaluator's verdict for one bracket.
#[derive(Debug, Clone)]
pub enum Verdict {
    Actionable(OptimalOrder),
    Rejected(Rejection),
}

/// A sized, costed order pair ready to hand to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimalOrder {
    pub target_shares: Decimal,
    pub up_cost: Decimal,
    pub down_cost: Decimal,
    pub total_cost: Decimal,
    pub expected_edge_cents: Decimal,
}

/// Walk `levels` (assumed ascending-by-price, as exported by
/// `MarketBook::ask_levels`) to find the cost of filling `target_shares`.
/// Returns `None` if the ladder is exhausted before `target_shares` is
/// reached.
#[must_use]
pub fn cost_to_fill(levels: &[PriceLevel], target_shares: Decimal) -> Option<Decimal> {
    if target_shares <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }

    let mut remaining = target_shares;
    let mut total_cost = Decimal::ZERO;

    for level in levels {
        let take = remaining.min(level.size);
        total_cost += take * level.price;
        remaining -= take;
        if remaining <= Decimal::ZERO {
            break;
        }
    }

    (remaining <= Decimal::ZERO).then_some(total_cost)
}

/// Evaluate a bracket's books against `config`, returning either a sized
/// order or the reason it was rejected.
#[must_use]
pub fn evaluate(books: &BracketBooks, config: &EvaluatorConfig) -> Verdict {
    let up_best_ask = books.up_book.best_ask();
    let down_best_ask = books.down_book.best_ask();

    let (Some(up_best_ask), Some(down_best_ask)) = (up_best_ask, down_best_ask) else {
        return Verdict::Rejected(Rejection::BookEmpty);
    };

    // Step 1: hot-path reject on the best-ask edge; slippage can only make
    // it worse.
    let sum_asks = up_best_ask.price + down_best_ask.price;
    let threshold = Decimal::ONE - config.min_edge_cents / dec!(100);
    if sum_asks >= threshold {
        return Verdict::Rejected(Rejection::EdgeTooSmall);
    }

    // Step 2: spread check.
    let up_spread = books.up_book.spread();
    let down_spread = books.down_book.spread();
    if up_spread.map_or(true, |s| s > config.max_spread) || down_spread.map_or(true, |s| s > config.max_spread) {
        return Verdict::Rejected(Rejection::SpreadTooWide);
    }

    // Step 3: depth at best ask.
    if up_best_ask.notional() < config.min_depth_notional || down_best_ask.notional() < config.min_depth_notional {
        return Verdict::Rejected(Rejection::DepthInsufficient);
    }

    // Step 4 & 5: walk the ladder and binary-search for the maximal size.
    let up_asks = books.up_book.ask_levels();
    let down_asks = books.down_book.ask_levels();

    let upper_bound = config.max_position_notional / dec!(0.3);
    let mut low = Decimal::ZERO;
    let mut high = upper_bound;
    let mut best: Option<OptimalOrder> = None;

    for _ in 0..40 {
        let mid = (low + high) / dec!(2);
        if mid <= Decimal::ZERO {
            break;
        }

        let (Some(up_cost), Some(down_cost)) = (cost_to_fill(&up_asks, mid), cost_to_fill(&down_asks, mid)) else {
            high = mid;
            continue;
        };

        let total_cost = up_cost + down_cost;
        if total_cost > config.max_position_notional {
            high = mid;
            continue;
        }

        let edge_cents = (mid - total_cost) * dec!(100);
        if edge_cents >= config.min_edge_cents {
            best = Some(OptimalOrder {
                target_shares: mid,
                up_cost,
                down_cost,
                total_cost,
                expected_edge_cents: edge_cents,
            });
            low = mid;
        } else {
            high = mid;
        }
    }

    match best {
        Some(order) if order.target_shares > Decimal::ZERO => Verdict::Actionable(order),
        _ => {
            // Distinguish "ladder too shallow" from "edge never clears" for
            // a more useful decision code, using the full-ladder depth as
            // the deciding factor.
            let up_total = up_asks.iter().fold(Decimal::ZERO, |acc, l| acc + l.size);
            let down_total = down_asks.iter().fold(Decimal::ZERO, |acc, l| acc + l.size);
            if up_total <= Decimal::ZERO || down_total <= Decimal::ZERO {
                Verdict::Rejected(Rejection::Unfillable)
            } else {
                Verdict::Rejected(Rejection::EdgeTooSmall)
            }
        }
    }
}
