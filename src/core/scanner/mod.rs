//! Scanner (§4.E) — the per-tick loop that turns catalog + book state into
//! executor calls. Evaluations are sequential within a tick; at most one
//! executor invocation is in flight per slug, enforced by consulting the
//! store for an already-open record before evaluating (§5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::book::{BookAggregator, DEFAULT_FRESHNESS_BUDGET_SECONDS};
use crate::core::catalog::{MarketCatalog, TradeableWindow};
use crate::core::domain::{BracketBooks, MarketMetadata, Slug, TokenId};
use crate::core::evaluator::{evaluate, EvaluatorConfig, Rejection, Verdict};
use crate::core::executor::{BracketRequest, ExecutionOutcome, TwoPhaseExecutor};
use crate::core::store::ExecutionStore;
use crate::core::telemetry::{Decision, DecisionCode, Tick, TelemetrySink};
use crate::error::Result;

/// Tunables recognized from the configuration surface (§6).
#[derive(Debug, Clone, Copy)]
pub struct ScannerConfig {
    pub cache_refresh_interval: StdDuration,
    pub event_driven: bool,
    pub event_wait: StdDuration,
    pub event_max_markets: usize,
    pub auto_execute_threshold_cents: Decimal,
    pub slippage: Decimal,
    pub bucket_offsets: Vec<i64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cache_refresh_interval: StdDuration::from_secs(30),
            event_driven: false,
            event_wait: StdDuration::ZERO,
            event_max_markets: 8,
            auto_execute_threshold_cents: dec!(2.0),
            slippage: dec!(0.01),
            bucket_offsets: vec![0, -1, 1, 2],
        }
    }
}

#[derive(Default)]
struct TickCounters {
    gamma_calls: AtomicU64,
    clob_calls: AtomicU64,
}

/// Wires the catalog, book aggregator, evaluator, and executor together
/// into one tick function the orchestrator drives on a loop or timer.
pub struct Scanner {
    catalog: Arc<MarketCatalog>,
    books: Arc<BookAggregator>,
    store: Arc<dyn ExecutionStore>,
    executor: Arc<TwoPhaseExecutor>,
    telemetry: Arc<dyn TelemetrySink>,
    evaluator_config: EvaluatorConfig,
    window: TradeableWindow,
    config: ScannerConfig,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
    counters: TickCounters,
}

impl Scanner {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<MarketCatalog>,
        books: Arc<BookAggregator>,
        store: Arc<dyn ExecutionStore>,
        executor: Arc<TwoPhaseExecutor>,
        telemetry: Arc<dyn TelemetrySink>,
        evaluator_config: EvaluatorConfig,
        window: TradeableWindow,
        config: ScannerConfig,
    ) -> Self {
        Self {
            catalog,
            books,
            store,
            executor,
            telemetry,
            evaluator_config,
            window,
            config,
            last_refresh: Mutex::new(None),
            counters: TickCounters::default(),
        }
    }

    /// Run one full tick: refresh, select, evaluate, route, emit telemetry.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        let started = Instant::now();

        let needs_refresh = self.last_refresh.lock().map_or(true, |last| now - last >= Duration::from_std(self.config.cache_refresh_interval).unwrap_or(Duration::seconds(30)));
        if needs_refresh {
            self.counters.gamma_calls.fetch_add(1, Ordering::Relaxed);
            self.catalog.refresh_deterministic(now, &self.config.bucket_offsets).await?;
            self.catalog.prune(now);
            *self.last_refresh.lock() = Some(now);
        }

        let tradeable = self.catalog.tradeable(now, self.window);
        let mut selected: Vec<MarketMetadata> = tradeable.into_values().collect();

        let mut dirty_tokens = 0usize;
        if self.config.event_driven {
            self.books.wait_for_update(self.config.event_wait).await;
            let dirty = self.books.drain_dirty();
            dirty_tokens = dirty.len();
            selected.retain(|meta| dirty.contains(meta.up_token()) || dirty.contains(meta.down_token()));
            selected.truncate(self.config.event_max_markets);
        }

        let tradeable_markets = selected.len();
        let mut evaluated_markets = 0usize;
        let mut edges_seen = 0usize;
        let mut edges_actionable = 0usize;
        let mut actions_taken = 0usize;
        let mut last_error: Option<String> = None;

        for meta in &selected {
            match self.evaluate_one(meta, now).await {
                Ok(Outcome::Evaluated { actionable, acted }) => {
                    evaluated_markets += 1;
                    if actionable {
                        edges_seen += 1;
                    }
                    if acted {
                        edges_actionable += 1;
                        actions_taken += 1;
                    }
                }
                Ok(Outcome::Skipped) => {}
                Err(e) => {
                    last_error = Some(e.to_string());
                    self.emit_decision(meta.slug(), meta, DecisionCode::Error, e.to_string(), now, None);
                }
            }
        }

        self.telemetry.tick(Tick {
            ts: now,
            ws_connected: self.books.is_connected(),
            last_message_age_sec: self.books.last_message_age_seconds(now),
            event_driven: self.config.event_driven,
            tick_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            tradeable_markets,
            evaluated_markets,
            dirty_tokens,
            gamma_calls: self.counters.gamma_calls.swap(0, Ordering::Relaxed),
            clob_calls: self.counters.clob_calls.swap(0, Ordering::Relaxed),
            sidecar_posts: 0,
            edges_seen,
            edges_actionable,
            actions_taken,
            last_error,
        });

        Ok(())
    }

    async fn evaluate_one(&self, meta: &MarketMetadata, now: DateTime<Utc>) -> Result<Outcome> {
        let slug = meta.slug();

        if self.store.open_execution_for_slug(slug).await?.is_some() {
            self.emit_decision(slug, meta, DecisionCode::SkipOpenPosition, "execution already open for this bracket".into(), now, None);
            return Ok(Outcome::Skipped);
        }

        let up_book = self.fetch_book(meta.up_token(), now).await?;
        let down_book = self.fetch_book(meta.down_token(), now).await?;
        let books = BracketBooks::new(up_book, down_book, now);

        match evaluate(&books, &self.evaluator_config) {
            Verdict::Rejected(Rejection::BookEmpty) => {
                self.emit_decision(slug, meta, DecisionCode::BookEmpty, "book empty on one or both sides".into(), now, None);
                Ok(Outcome::Skipped)
            }
            Verdict::Rejected(Rejection::Unfillable) => {
                self.emit_decision(slug, meta, DecisionCode::NotFillable, "ladder exhausted before reaching any fillable size".into(), now, None);
                Ok(Outcome::Skipped)
            }
            Verdict::Rejected(r @ (Rejection::EdgeTooSmall | Rejection::SpreadTooWide | Rejection::DepthInsufficient)) => {
                // The original reserves EDGE_TOO_SMALL for the fillable-but-below-
                // auto-execute advisory below; every is_fillable_arb failure here
                // (edge, spread, depth) is NOT_FILLABLE.
                self.emit_decision(slug, meta, DecisionCode::NotFillable, format!("not fillable: {r:?}"), now, None);
                Ok(Outcome::Evaluated { actionable: false, acted: false })
            }
            Verdict::Actionable(order) if order.target_shares <= Decimal::ZERO => {
                self.emit_decision(slug, meta, DecisionCode::SkipSizeZero, "optimal size collapsed to zero".into(), now, None);
                Ok(Outcome::Evaluated { actionable: false, acted: false })
            }
            Verdict::Actionable(order) => {
                self.emit_decision(slug, meta, DecisionCode::Actionable, "actionable opportunity found".into(), now, Some(order.expected_edge_cents));

                if order.expected_edge_cents < self.config.auto_execute_threshold_cents {
                    self.emit_decision(slug, meta, DecisionCode::EdgeTooSmall, "below auto-execute threshold".into(), now, Some(order.expected_edge_cents));
                    return Ok(Outcome::Evaluated { actionable: true, acted: false });
                }

                let up_price_limit = books.up_book.best_ask().map_or(Decimal::ZERO, |l| l.price * (Decimal::ONE + self.config.slippage));
                let down_price_limit = books.down_book.best_ask().map_or(Decimal::ZERO, |l| l.price * (Decimal::ONE + self.config.slippage));

                let req = BracketRequest {
                    slug,
                    up_token: meta.up_token().clone(),
                    down_token: meta.down_token().clone(),
                    target_shares: order.target_shares,
                    up_price_limit,
                    down_price_limit,
                    estimated_total_notional: order.total_cost,
                    dry_run: false,
                };

                match self.executor.execute_bracket(req, now).await {
                    Ok(ExecutionOutcome::Done(_)) => Ok(Outcome::Evaluated { actionable: true, acted: true }),
                    Ok(ExecutionOutcome::Aborted(_)) => {
                        self.emit_decision(slug, meta, DecisionCode::ExecuteFailed, "execution aborted".into(), now, Some(order.expected_edge_cents));
                        Ok(Outcome::Evaluated { actionable: true, acted: true })
                    }
                    Ok(ExecutionOutcome::Refused(refusal)) => {
                        let code = if matches!(refusal, crate::core::risk::RiskRefusal::TradingDisabled) { DecisionCode::KillSwitch } else { DecisionCode::ExecuteFailed };
                        self.emit_decision(slug, meta, code, format!("{refusal:?}"), now, Some(order.expected_edge_cents));
                        Ok(Outcome::Evaluated { actionable: true, acted: false })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn fetch_book(&self, token: &TokenId, now: DateTime<Utc>) -> Result<crate::core::domain::MarketBook> {
        self.counters.clob_calls.fetch_add(1, Ordering::Relaxed);
        self.books.ensure_fresh(token, Duration::seconds(DEFAULT_FRESHNESS_BUDGET_SECONDS), now).await
    }

    fn emit_decision(&self, slug: Slug, meta: &MarketMetadata, code: DecisionCode, message: String, now: DateTime<Utc>, edge_cents: Option<Decimal>) {
        self.telemetry.decision(Decision { ts: now, slug: slug.to_string(), market_label: meta.question().to_string(), code, message, edge_cents, extra: None });
    }
}

enum Outcome {
    Evaluated { actionable: bool, acted: bool },
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::GammaClient;
    use crate::core::domain::{ExecutionRecord, MarketBook, Side};
    use crate::core::executor::{ExecutorConfig, OrderPlacer, OrderPlacerLimits, SimulatedOrderPlacer};
    use crate::core::risk::{RiskLimits, RiskRegister};
    use crate::core::store::InMemoryExecutionStore;
    use crate::core::telemetry::NullTelemetrySink;
    use async_trait::async_trait;

    struct NoopGamma;
    #[async_trait]
    impl GammaClient for NoopGamma {
        async fn fetch_market(&self, _slug: Slug) -> Result<Option<MarketMetadata>> {
            Ok(None)
        }
    }

    fn scanner() -> Scanner {
        let catalog = Arc::new(MarketCatalog::new(Box::new(NoopGamma)));
        let books = Arc::new(BookAggregator::new("wss://example.invalid/ws", "https://example.invalid"));
        let store: Arc<dyn ExecutionStore> = Arc::new(InMemoryExecutionStore::new());
        let risk = Arc::new(RiskRegister::new(
            store.clone(),
            RiskLimits { max_open_brackets: 5, max_estimated_notional_per_bracket: Decimal::ZERO, daily_estimated_notional_cap: Decimal::ZERO },
            true,
        ));
        let placer: Arc<dyn OrderPlacer> = Arc::new(SimulatedOrderPlacer::new(true, OrderPlacerLimits { max_order_notional: Decimal::ZERO }));
        let telemetry: Arc<dyn TelemetrySink> = Arc::new(NullTelemetrySink);
        let executor = Arc::new(TwoPhaseExecutor::new(store.clone(), risk, placer, telemetry.clone(), ExecutorConfig::default()));
        Scanner::new(
            catalog,
            books,
            store,
            executor,
            telemetry,
            EvaluatorConfig { min_edge_cents: dec!(1.0), max_spread: dec!(0.03), min_depth_notional: dec!(50), max_position_notional: dec!(40) },
            TradeableWindow::default(),
            ScannerConfig::default(),
        )
    }

    #[tokio::test]
    async fn tick_with_no_tradeable_markets_is_a_no_op() {
        let scanner = scanner();
        scanner.tick(Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn skips_brackets_with_an_open_execution() {
        let scanner = scanner();
        let slug = Slug::new(900);
        let rec = ExecutionRecord::planned(slug, TokenId::new("u"), TokenId::new("d"), dec!(1), dec!(1), "direct", Utc::now());
        scanner.store.upsert(&rec).await.unwrap();

        let meta = MarketMetadata::new(slug, "c1", "q", Utc::now() + chrono::Duration::minutes(5), "Up", "Down", TokenId::new("u"), TokenId::new("d"), 0.0);
        let outcome = scanner.evaluate_one(&meta, Utc::now()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped));
    }

    #[tokio::test]
    async fn actionable_below_threshold_does_not_execute() {
        let mut scanner = scanner();
        scanner.config.auto_execute_threshold_cents = dec!(1000);
        let slug = Slug::new(900);
        let meta = MarketMetadata::new(slug, "c1", "q", Utc::now() + chrono::Duration::minutes(5), "Up", "Down", TokenId::new("up"), TokenId::new("down"), 0.0);

        let ts = Utc::now();
        let mut up_book = MarketBook::new(TokenId::new("up"));
        up_book.apply_price_change(Side::Ask, dec!(0.45), dec!(200), ts);
        up_book.apply_price_change(Side::Bid, dec!(0.44), dec!(200), ts);
        scanner.books.seed_snapshot(up_book);

        let mut down_book = MarketBook::new(TokenId::new("down"));
        down_book.apply_price_change(Side::Ask, dec!(0.52), dec!(200), ts);
        down_book.apply_price_change(Side::Bid, dec!(0.51), dec!(200), ts);
        scanner.books.seed_snapshot(down_book);

        let outcome = scanner.evaluate_one(&meta, Utc::now()).await.unwrap();
        match outcome {
            Outcome::Evaluated { actionable, acted } => {
                assert!(actionable);
                assert!(!acted);
            }
            Outcome::Skipped => panic!("expected an evaluation"),
        }
        assert_eq!(scanner.store.count_open_non_terminal().await.unwrap(), 0);
    }

    // Scenario 2: best asks sum to exactly 1.0 — edge 0, not fillable. The
    // original reserves EDGE_TOO_SMALL for the below-auto-execute advisory,
    // so every is_fillable_arb failure here must surface as NOT_FILLABLE.
    #[tokio::test]
    async fn scenario_no_arb_sum_is_one_emits_not_fillable() {
        let catalog = Arc::new(MarketCatalog::new(Box::new(NoopGamma)));
        let books = Arc::new(BookAggregator::new("wss://example.invalid/ws", "https://example.invalid"));
        let store: Arc<dyn ExecutionStore> = Arc::new(InMemoryExecutionStore::new());
        let risk = Arc::new(RiskRegister::new(
            store.clone(),
            RiskLimits { max_open_brackets: 5, max_estimated_notional_per_bracket: Decimal::ZERO, daily_estimated_notional_cap: Decimal::ZERO },
            true,
        ));
        let placer: Arc<dyn OrderPlacer> = Arc::new(SimulatedOrderPlacer::new(true, OrderPlacerLimits { max_order_notional: Decimal::ZERO }));
        let (telemetry, mut events) = crate::core::telemetry::ChannelTelemetrySink::channel(8);
        let telemetry: Arc<dyn TelemetrySink> = Arc::new(telemetry);
        let executor = Arc::new(TwoPhaseExecutor::new(store.clone(), risk, placer, telemetry.clone(), ExecutorConfig::default()));
        let scanner = Scanner::new(
            catalog,
            books,
            store,
            executor,
            telemetry,
            EvaluatorConfig { min_edge_cents: dec!(1.0), max_spread: dec!(0.03), min_depth_notional: dec!(50), max_position_notional: dec!(40) },
            TradeableWindow::default(),
            ScannerConfig::default(),
        );

        let slug = Slug::new(900);
        let meta = MarketMetadata::new(slug, "c1", "q", Utc::now() + chrono::Duration::minutes(5), "Up", "Down", TokenId::new("up"), TokenId::new("down"), 0.0);

        let ts = Utc::now();
        let mut up_book = MarketBook::new(TokenId::new("up"));
        up_book.apply_price_change(Side::Ask, dec!(0.50), dec!(100), ts);
        up_book.apply_price_change(Side::Bid, dec!(0.49), dec!(100), ts);
        scanner.books.seed_snapshot(up_book);

        let mut down_book = MarketBook::new(TokenId::new("down"));
        down_book.apply_price_change(Side::Ask, dec!(0.50), dec!(100), ts);
        down_book.apply_price_change(Side::Bid, dec!(0.49), dec!(100), ts);
        scanner.books.seed_snapshot(down_book);

        let outcome = scanner.evaluate_one(&meta, Utc::now()).await.unwrap();
        match outcome {
            Outcome::Evaluated { actionable, acted } => {
                assert!(!actionable);
                assert!(!acted);
            }
            Outcome::Skipped => panic!("expected an evaluation"),
        }

        let event = events.try_recv().expect("a decision was emitted");
        match event {
            crate::core::telemetry::Event::Decision(d) => assert_eq!(d.code, DecisionCode::NotFillable),
            crate::core::telemetry::Event::Tick(_) => panic!("expected a decision event"),
        }
    }
}
