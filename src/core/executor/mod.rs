//! Two-Phase Executor (§4.F) — the crash-safe state machine that turns an
//! actionable bracket into two confirmed fills or a clean ABORT.
//!
//! Every transition is persisted before the next exchange call (§4.F.7), so
//! a process crash at any point leaves the store in a state from which
//! [`TwoPhaseExecutor::resume_pending`] can continue safely without
//! duplicating an already-placed leg (P6).

mod clob_placer;
mod order_placer;

pub use clob_placer::{ClobOrderPlacer, OrderSigner};
pub use order_placer::{OrderPlacer, OrderPlacerLimits, OrderSnapshot, OrderStatus, PlacedOrder, SimulatedOrderPlacer};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::domain::{execution_id, ExecutionRecord, ExecutionState, Side, Slug, TokenId};
use crate::core::risk::{RiskRefusal, RiskRegister};
use crate::core::store::ExecutionStore;
use crate::core::telemetry::{Decision, DecisionCode, TelemetrySink};
use crate::error::{Error, Result};

/// Per-leg and unhedged-window deadlines (§6 defaults).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub leg_a_timeout: StdDuration,
    pub leg_b_timeout: StdDuration,
    pub max_unhedged: StdDuration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { leg_a_timeout: StdDuration::from_secs(12), leg_b_timeout: StdDuration::from_secs(18), max_unhedged: StdDuration::from_secs(25) }
    }
}

/// One bracket's worth of execution input. Price limits are the caller's
/// responsibility (typically `best_ask * (1 + small_slippage)`); the
/// executor never re-quotes on its own.
#[derive(Debug, Clone)]
pub struct BracketRequest {
    pub slug: Slug,
    pub up_token: TokenId,
    pub down_token: TokenId,
    pub target_shares: Decimal,
    pub up_price_limit: Decimal,
    pub down_price_limit: Decimal,
    pub estimated_total_notional: Decimal,
    pub dry_run: bool,
}

/// Result of one `execute_bracket` call (or of reaching the cached terminal
/// state immediately, per the idempotent-start contract).
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Done(ExecutionRecord),
    Aborted(ExecutionRecord),
    Refused(RiskRefusal),
}

fn refusal_decision_code(refusal: &RiskRefusal) -> DecisionCode {
    match refusal {
        RiskRefusal::TradingDisabled => DecisionCode::KillSwitch,
        RiskRefusal::PerBracketCapExceeded | RiskRefusal::DailyCapExceeded | RiskRefusal::OpenBracketsCapReached => DecisionCode::ExecuteFailed,
    }
}

pub struct TwoPhaseExecutor {
    store: Arc<dyn ExecutionStore>,
    risk: Arc<RiskRegister>,
    placer: Arc<dyn OrderPlacer>,
    telemetry: Arc<dyn TelemetrySink>,
    config: ExecutorConfig,
}

impl TwoPhaseExecutor {
    #[must_use]
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        risk: Arc<RiskRegister>,
        placer: Arc<dyn OrderPlacer>,
        telemetry: Arc<dyn TelemetrySink>,
        config: ExecutorConfig,
    ) -> Self {
        Self { store, risk, placer, telemetry, config }
    }

    /// Drive `req` through the state machine to a terminal state, returning
    /// immediately if an existing record for this `execution_id` is already
    /// terminal (§4.F.2 idempotent start).
    pub async fn execute_bracket(&self, req: BracketRequest, now: DateTime<Utc>) -> Result<ExecutionOutcome> {
        let id = execution_id(req.slug, &req.up_token, &req.down_token, req.target_shares);

        if let Some(existing) = self.store.get(&id).await? {
            if existing.state.is_terminal() {
                return Ok(terminal_outcome(existing));
            }
            return self.drive(existing, &req, now).await;
        }

        match self.risk.check(req.estimated_total_notional, req.dry_run).await? {
            Err(refusal) => {
                self.emit_decision(&req.slug, &req.up_token, &req.down_token, refusal_decision_code(&refusal), format!("{refusal:?}"), now);
                return Ok(ExecutionOutcome::Refused(refusal));
            }
            Ok(()) => {}
        }

        let backend_tag = if req.dry_run { "simulated" } else { "direct" };
        let record = ExecutionRecord::planned(req.slug, req.up_token.clone(), req.down_token.clone(), req.target_shares, req.estimated_total_notional, backend_tag, now);
        self.store.upsert(&record).await?;
        self.drive(record, &req, now).await
    }

    /// Re-confirm every persisted LEG_A_PLACED/LEG_B_PLACED record on
    /// process start (§4.F.6). Records stuck at PLANNED never reached the
    /// exchange, but their price limits were never persisted (they are not
    /// part of `ExecutionRecord`'s durable schema per §3); since resuming
    /// them would require minting a fresh quote we don't have, they are
    /// aborted rather than guessed at. `requote` lets the caller supply a
    /// live quote for a record about to need one (placing leg B); returning
    /// `None` causes that record to abort instead of placing at an unknown
    /// price.
    pub async fn resume_pending(&self, requote: &dyn Fn(&ExecutionRecord) -> Option<(Decimal, Decimal)>, now: DateTime<Utc>) -> Result<Vec<ExecutionOutcome>> {
        let pending = self.store.list_non_terminal().await?;
        let mut outcomes = Vec::with_capacity(pending.len());

        for record in pending {
            if !matches!(record.state, ExecutionState::LegAPlaced | ExecutionState::LegBPlaced) {
                outcomes.push(self.abort(record, now, "resumed at a pre-placement state with no persisted price limit").await?);
                continue;
            }

            let quote = requote(&record);
            let req = BracketRequest {
                slug: record.slug,
                up_token: record.up_token.clone(),
                down_token: record.down_token.clone(),
                target_shares: record.target_shares,
                up_price_limit: quote.map_or(Decimal::ZERO, |q| q.0),
                down_price_limit: quote.map_or(Decimal::ZERO, |q| q.1),
                estimated_total_notional: record.estimated_total_notional,
                dry_run: record.backend_tag == "simulated",
            };
            outcomes.push(self.drive(record, &req, now).await?);
        }

        Ok(outcomes)
    }

    async fn drive(&self, mut record: ExecutionRecord, req: &BracketRequest, now: DateTime<Utc>) -> Result<ExecutionOutcome> {
        loop {
            match record.state {
                ExecutionState::Planned => {
                    match self.place_leg(Side::Bid, &req.up_token, req.up_price_limit, req.target_shares, req.dry_run).await {
                        Ok(placed) => {
                            record.leg_a_external_id = Some(placed.external_id);
                            record.leg_a_raw_blob = Some(placed.raw);
                            record.transition(ExecutionState::LegAPlaced, now);
                            self.store.upsert(&record).await?;
                        }
                        Err(e) => return self.abort(record, now, &format!("leg a placement failed: {e}")).await,
                    }
                }

                ExecutionState::LegAPlaced => {
                    let external_id = record.leg_a_external_id.clone().ok_or_else(|| Error::Execution("LEG_A_PLACED record missing external id".into()))?;
                    match self.confirm_leg(&external_id, req.target_shares, self.config.leg_a_timeout).await {
                        Ok(true) => {
                            record.transition(ExecutionState::LegAFilled, now);
                            self.store.upsert(&record).await?;
                        }
                        Ok(false) => return self.abort(record, now, "leg a not filled within timeout").await,
                        Err(e) => return self.abort(record, now, &format!("leg a fill confirmation error: {e}")).await,
                    }
                }

                ExecutionState::LegAFilled => {
                    let elapsed = now.signed_duration_since(record.created_at).to_std().unwrap_or_default();
                    if elapsed > self.config.max_unhedged {
                        return self.abort(record, now, "unhedged guard: max_unhedged_seconds exceeded before leg b placement").await;
                    }
                    if req.down_price_limit <= Decimal::ZERO {
                        return self.abort(record, now, "no live quote available to place leg b").await;
                    }
                    match self.place_leg(Side::Bid, &req.down_token, req.down_price_limit, req.target_shares, req.dry_run).await {
                        Ok(placed) => {
                            record.leg_b_external_id = Some(placed.external_id);
                            record.leg_b_raw_blob = Some(placed.raw);
                            record.transition(ExecutionState::LegBPlaced, now);
                            self.store.upsert(&record).await?;
                        }
                        Err(e) => return self.abort(record, now, &format!("leg b placement failed: {e}")).await,
                    }
                }

                ExecutionState::LegBPlaced => {
                    let external_id = record.leg_b_external_id.clone().ok_or_else(|| Error::Execution("LEG_B_PLACED record missing external id".into()))?;
                    match self.confirm_leg(&external_id, req.target_shares, self.config.leg_b_timeout).await {
                        Ok(true) => {
                            record.transition(ExecutionState::HedgedFilled, now);
                            self.store.upsert(&record).await?;
                        }
                        Ok(false) => return self.abort(record, now, "leg b not filled within timeout; leg a left unhedged").await,
                        Err(e) => return self.abort(record, now, &format!("leg b fill confirmation error: {e}")).await,
                    }
                }

                ExecutionState::HedgedFilled => {
                    record.transition(ExecutionState::Done, now);
                    self.store.upsert(&record).await?;
                    return Ok(ExecutionOutcome::Done(record));
                }

                ExecutionState::Done | ExecutionState::Aborted => return Ok(terminal_outcome(record)),
            }
        }
    }

    async fn place_leg(&self, side: Side, token: &TokenId, price_limit: Decimal, size: Decimal, dry_run: bool) -> Result<PlacedOrder> {
        let notional = price_limit * size;
        self.placer.place_limit(token, side, price_limit, size, notional, dry_run).await
    }

    /// Waits for a fill, cancelling best-effort on any non-fill outcome so
    /// a timed-out order doesn't keep resting after we've given up on it.
    async fn confirm_leg(&self, external_id: &str, target_size: Decimal, timeout: StdDuration) -> Result<bool> {
        match self.placer.wait_until_filled(external_id, target_size, timeout).await {
            Ok((true, _)) => Ok(true),
            Ok((false, _)) => {
                self.placer.cancel(external_id).await;
                Ok(false)
            }
            Err(e) => {
                self.placer.cancel(external_id).await;
                Err(e)
            }
        }
    }

    async fn abort(&self, mut record: ExecutionRecord, now: DateTime<Utc>, reason: &str) -> Result<ExecutionOutcome> {
        record.transition(ExecutionState::Aborted, now);
        self.store.upsert(&record).await?;
        self.emit_decision(&record.slug, &record.up_token, &record.down_token, DecisionCode::ExecuteFailed, reason.to_string(), now);
        Ok(ExecutionOutcome::Aborted(record))
    }

    fn emit_decision(&self, slug: &Slug, up_token: &TokenId, down_token: &TokenId, code: DecisionCode, message: String, now: DateTime<Utc>) {
        self.telemetry.decision(Decision {
            ts: now,
            slug: slug.to_string(),
            market_label: format!("{up_token}/{down_token}"),
            code,
            message,
            edge_cents: None,
            extra: None,
        });
    }
}

fn terminal_outcome(record: ExecutionRecord) -> ExecutionOutcome {
    if record.state == ExecutionState::Done {
        ExecutionOutcome::Done(record)
    } else {
        ExecutionOutcome::Aborted(record)
    }
}
