//! Persisted execution state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{Slug, TokenId};

/// States of the two-phase execution state machine. `DONE` and `ABORTED` are
/// terminal: once reached, a record is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Planned,
    LegAPlaced,
    LegAFilled,
    LegBPlaced,
    HedgedFilled,
    Done,
    Aborted,
}

impl ExecutionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::LegAPlaced => "LEG_A_PLACED",
            Self::LegAFilled => "LEG_A_FILLED",
            Self::LegBPlaced => "LEG_B_PLACED",
            Self::HedgedFilled => "HEDGED_FILLED",
            Self::Done => "DONE",
            Self::Aborted => "ABORTED",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PLANNED" => Self::Planned,
            "LEG_A_PLACED" => Self::LegAPlaced,
            "LEG_A_FILLED" => Self::LegAFilled,
            "LEG_B_PLACED" => Self::LegBPlaced,
            "HEDGED_FILLED" => Self::HedgedFilled,
            "DONE" => Self::Done,
            "ABORTED" => Self::Aborted,
            _ => return None,
        })
    }

    /// Whether `next` is a legal direct successor of `self` in the state DAG
    /// (ABORTED is reachable from every non-terminal state).
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        use ExecutionState::{Aborted, Done, HedgedFilled, LegAFilled, LegAPlaced, LegBPlaced, Planned};
        match (self, next) {
            (Planned, LegAPlaced)
            | (LegAPlaced, LegAFilled)
            | (LegAFilled, LegBPlaced)
            | (LegBPlaced, HedgedFilled)
            | (HedgedFilled, Done) => true,
            (s, Aborted) => !s.is_terminal(),
            _ => false,
        }
    }
}

/// Deterministic, reproducible execution identifier derived from the
/// bracket and quantized target size, so that re-evaluating the same
/// opportunity never mints a second identity for it.
#[must_use]
pub fn execution_id(slug: Slug, up_token: &TokenId, down_token: &TokenId, target_shares: Decimal) -> String {
    let quantized = (target_shares * Decimal::from(1000)).trunc();
    format!("{slug}:{up_token}:{down_token}:{quantized}")
}

/// The persisted, durable state of one bracket execution.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub slug: Slug,
    pub up_token: TokenId,
    pub down_token: TokenId,
    pub target_shares: Decimal,
    pub state: ExecutionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub leg_a_external_id: Option<String>,
    pub leg_b_external_id: Option<String>,
    pub leg_a_raw_blob: Option<String>,
    pub leg_b_raw_blob: Option<String>,
    pub estimated_total_notional: Decimal,
    pub backend_tag: String,
}

impl ExecutionRecord {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn planned(
        slug: Slug,
        up_token: TokenId,
        down_token: TokenId,
        target_shares: Decimal,
        estimated_total_notional: Decimal,
        backend_tag: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let execution_id = execution_id(slug, &up_token, &down_token, target_shares);
        Self {
            execution_id,
            slug,
            up_token,
            down_token,
            target_shares,
            state: ExecutionState::Planned,
            created_at: now,
            updated_at: now,
            leg_a_external_id: None,
            leg_b_external_id: None,
            leg_a_raw_blob: None,
            leg_b_raw_blob: None,
            estimated_total_notional,
            backend_tag: backend_tag.into(),
        }
    }

    /// Advance to `next`, asserting the transition is legal per the state
    /// DAG. The caller is responsible for persisting the mutated record
    /// before making any further exchange call (see executor §4.F.7).
    pub fn transition(&mut self, next: ExecutionState, now: DateTime<Utc>) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal execution state transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        self.updated_at = now;
    }

    /// True if the record has a leg A external ID but no leg B external ID
    /// and is terminally ABORTED — the minimal signal an external exit
    /// manager needs to find unhedged inventory.
    #[must_use]
    pub fn is_unresolved_hedge(&self) -> bool {
        self.state == ExecutionState::Aborted
            && self.leg_a_external_id.is_some()
            && self.leg_b_external_id.is_none()
    }
}
