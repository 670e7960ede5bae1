//! Risk Register (§4.H) — a small, process-wide gate consulted before every
//! execution placement. Reads are derived from the execution store rather
//! than cached separately, so there is no risk-counter cache to keep in sync
//! with the store (§5 "Risk counters: derived from the store via aggregate
//! queries ... no separate mutable cache").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::core::store::ExecutionStore;
use crate::error::Result;

/// Caps enforced at the risk gate (§6 configuration surface).
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub max_open_brackets: usize,
    /// `0` means unlimited.
    pub max_estimated_notional_per_bracket: Decimal,
    /// `0` means unlimited.
    pub daily_estimated_notional_cap: Decimal,
}

/// Why the risk gate refused an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskRefusal {
    TradingDisabled,
    PerBracketCapExceeded,
    DailyCapExceeded,
    OpenBracketsCapReached,
}

impl RiskRefusal {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TradingDisabled => "KILL_SWITCH",
            Self::PerBracketCapExceeded | Self::DailyCapExceeded | Self::OpenBracketsCapReached => "RISK_REFUSED",
        }
    }
}

/// Process-wide risk gate. `trading_enabled` is the kill switch from §6;
/// flipping it to `false` stops the scanner from initiating new executions
/// without disturbing in-flight ones (§5).
pub struct RiskRegister {
    store: Arc<dyn ExecutionStore>,
    limits: RiskLimits,
    trading_enabled: AtomicBool,
}

impl RiskRegister {
    #[must_use]
    pub fn new(store: Arc<dyn ExecutionStore>, limits: RiskLimits, trading_enabled: bool) -> Self {
        Self { store, limits, trading_enabled: AtomicBool::new(trading_enabled) }
    }

    #[must_use]
    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled.load(Ordering::Acquire)
    }

    pub fn set_trading_enabled(&self, enabled: bool) {
        self.trading_enabled.store(enabled, Ordering::Release);
    }

    pub async fn count_open_non_terminal(&self) -> Result<usize> {
        self.store.count_open_non_terminal().await
    }

    pub async fn sum_estimated_notional_today(&self) -> Result<Decimal> {
        self.store.sum_estimated_notional_for_utc_day(Utc::now().date_naive()).await
    }

    /// Evaluate the gate for a prospective execution of `estimated_notional`.
    /// `dry_run` bypasses the kill switch (§4.F.1) but still enforces the
    /// numeric caps — a simulation run still proves out the risk math.
    pub async fn check(&self, estimated_notional: Decimal, dry_run: bool) -> Result<std::result::Result<(), RiskRefusal>> {
        if !dry_run && !self.trading_enabled() {
            return Ok(Err(RiskRefusal::TradingDisabled));
        }

        if self.limits.max_estimated_notional_per_bracket > Decimal::ZERO
            && estimated_notional > self.limits.max_estimated_notional_per_bracket
        {
            return Ok(Err(RiskRefusal::PerBracketCapExceeded));
        }

        if self.limits.daily_estimated_notional_cap > Decimal::ZERO {
            let today = self.sum_estimated_notional_today().await?;
            if today + estimated_notional > self.limits.daily_estimated_notional_cap {
                return Ok(Err(RiskRefusal::DailyCapExceeded));
            }
        }

        let open = self.count_open_non_terminal().await?;
        if open >= self.limits.max_open_brackets {
            return Ok(Err(RiskRefusal::OpenBracketsCapReached));
        }

        Ok(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ExecutionRecord, ExecutionState, Slug, TokenId};
    use crate::core::store::InMemoryExecutionStore;
    use rust_decimal_macros::dec;

    fn limits() -> RiskLimits {
        RiskLimits { max_open_brackets: 2, max_estimated_notional_per_bracket: dec!(40), daily_estimated_notional_cap: dec!(100) }
    }

    #[tokio::test]
    async fn refuses_when_trading_disabled_and_not_dry_run() {
        let reg = RiskRegister::new(Arc::new(InMemoryExecutionStore::new()), limits(), false);
        assert_eq!(reg.check(dec!(10), false).await.unwrap(), Err(RiskRefusal::TradingDisabled));
    }

    #[tokio::test]
    async fn dry_run_bypasses_kill_switch() {
        let reg = RiskRegister::new(Arc::new(InMemoryExecutionStore::new()), limits(), false);
        assert_eq!(reg.check(dec!(10), true).await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn refuses_when_per_bracket_cap_exceeded() {
        let reg = RiskRegister::new(Arc::new(InMemoryExecutionStore::new()), limits(), true);
        assert_eq!(reg.check(dec!(41), false).await.unwrap(), Err(RiskRefusal::PerBracketCapExceeded));
    }

    #[tokio::test]
    async fn zero_cap_means_unlimited() {
        let unlimited = RiskLimits { max_open_brackets: 10, max_estimated_notional_per_bracket: Decimal::ZERO, daily_estimated_notional_cap: Decimal::ZERO };
        let reg = RiskRegister::new(Arc::new(InMemoryExecutionStore::new()), unlimited, true);
        assert_eq!(reg.check(dec!(1_000_000), false).await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn refuses_when_open_brackets_cap_reached() {
        let store = Arc::new(InMemoryExecutionStore::new());
        for secs in [900_i64, 1_800] {
            let rec = ExecutionRecord::planned(Slug::new(secs), TokenId::new("u"), TokenId::new("d"), dec!(1), dec!(1), "direct", Utc::now());
            store.upsert(&rec).await.unwrap();
        }
        let reg = RiskRegister::new(store, limits(), true);
        assert_eq!(reg.check(dec!(1), false).await.unwrap(), Err(RiskRefusal::OpenBracketsCapReached));
    }

    #[tokio::test]
    async fn terminal_executions_do_not_count_against_open_cap() {
        let store = Arc::new(InMemoryExecutionStore::new());
        let mut rec = ExecutionRecord::planned(Slug::new(900), TokenId::new("u"), TokenId::new("d"), dec!(1), dec!(1), "direct", Utc::now());
        rec.transition(ExecutionState::Aborted, Utc::now());
        store.upsert(&rec).await.unwrap();

        let reg = RiskRegister::new(store, limits(), true);
        assert_eq!(reg.check(dec!(1), false).await.unwrap(), Ok(()));
    }

    // P7: conservation of the daily cap.
    #[tokio::test]
    async fn refuses_when_daily_cap_would_be_exceeded() {
        let store = Arc::new(InMemoryExecutionStore::new());
        let rec = ExecutionRecord::planned(Slug::new(900), TokenId::new("u"), TokenId::new("d"), dec!(1), dec!(90), "direct", Utc::now());
        store.upsert(&rec).await.unwrap();

        let reg = RiskRegister::new(store, limits(), true);
        assert_eq!(reg.check(dec!(15), false).await.unwrap(), Err(RiskRefusal::DailyCapExceeded));
        assert_eq!(reg.check(dec!(10), false).await.unwrap(), Ok(()));
    }
}
