//! Wires the config into a running system: database, catalog, book
//! aggregator, risk register, executor, scanner, and the `tokio::select!`
//! run loop that ticks it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing::{info, warn};

use crate::app::config::Config;
use crate::core::book::BookAggregator;
use crate::core::catalog::{HttpGammaClient, MarketCatalog, TradeableWindow};
use crate::core::db::{self, DbPool};
use crate::core::domain::ExecutionRecord;
use crate::core::executor::{OrderPlacer, SimulatedOrderPlacer, TwoPhaseExecutor};
use crate::core::risk::RiskRegister;
use crate::core::scanner::Scanner;
use crate::core::store::{ExecutionStore, SqliteExecutionStore};
use crate::core::telemetry::{Event, NullTelemetrySink, TelemetrySink};
use crate::error::Result;

/// One-shot health/inventory snapshot, shared by `status` output and the CLI.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub ws_connected: bool,
    pub tradeable_markets: usize,
    pub known_slugs: usize,
    pub trading_enabled: bool,
    pub open_brackets: usize,
    pub estimated_notional_today: String,
}

/// Everything the running process needs, built once at startup.
pub struct App {
    config: Config,
    catalog: Arc<MarketCatalog>,
    books: Arc<BookAggregator>,
    store: Arc<dyn ExecutionStore>,
    risk: Arc<RiskRegister>,
    executor: Arc<TwoPhaseExecutor>,
    scanner: Arc<Scanner>,
    window: TradeableWindow,
}

impl App {
    /// Build every component described by `config` without starting any
    /// background task. Creates the database pool and runs migrations.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let database_url = format!("sqlite://{}", config.database.path);
        let pool: DbPool = db::create_pool(&database_url)?;
        db::run_migrations(&pool)?;
        info!(path = %config.database.path, "database ready");

        let store: Arc<dyn ExecutionStore> = Arc::new(SqliteExecutionStore::new(pool));

        let gamma = HttpGammaClient::new(config.network.gamma_base_url.clone());
        let catalog = Arc::new(MarketCatalog::new(Box::new(gamma)));
        let books = Arc::new(BookAggregator::new(config.network.ws_url.clone(), config.network.clob_base_url.clone()));

        let risk = Arc::new(RiskRegister::new(store.clone(), config.risk.clone().into(), config.risk.trading_enabled));

        let placer: Arc<dyn OrderPlacer> =
            Arc::new(SimulatedOrderPlacer::new(config.risk.trading_enabled, config.order_placer.clone().into()));

        let telemetry: Arc<dyn TelemetrySink> = Arc::new(NullTelemetrySink);

        let executor = Arc::new(TwoPhaseExecutor::new(store.clone(), risk.clone(), placer, telemetry.clone(), config.executor.clone().into()));

        let window = TradeableWindow {
            min_minutes: config.catalog.tradeable_min_minutes,
            max_minutes: config.catalog.tradeable_max_minutes,
            no_trade_tail_seconds: config.catalog.no_trade_tail_seconds,
        };

        let scanner = Arc::new(Scanner::new(
            catalog.clone(),
            books.clone(),
            store.clone(),
            executor.clone(),
            telemetry,
            config.evaluator.clone().into(),
            window,
            config.scanner.to_core(&config.catalog),
        ));

        Ok(Self { config, catalog, books, store, risk, executor, scanner, window })
    }

    /// Resolve the tradeable set, seed the book aggregator's working set,
    /// spawn the ingest task, resume any crash-interrupted executions, and
    /// tick the scanner on an interval until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
        info!(trading_enabled = self.risk.trading_enabled(), dry_run = self.config.order_placer.dry_run, "starting bracket15");

        let now = chrono::Utc::now();
        self.catalog.refresh_deterministic(now, &self.config.catalog.bucket_offsets).await?;
        let tradeable = self.catalog.tradeable(now, self.window);
        let tokens = tradeable.values().flat_map(|m| [m.up_token().clone(), m.down_token().clone()]);
        self.books.set_working_set(tokens);
        self.books.spawn();

        let requote = |record: &ExecutionRecord| -> Option<(rust_decimal::Decimal, rust_decimal::Decimal)> {
            let up = self.books.snapshot(&record.up_token)?.best_ask()?.price;
            let down = self.books.snapshot(&record.down_token)?.best_ask()?.price;
            Some((up, down))
        };
        let resumed = self.executor.resume_pending(&requote, now).await?;
        if !resumed.is_empty() {
            info!(count = resumed.len(), "resumed in-flight executions");
        }

        let mut tick_interval = tokio::time::interval(StdDuration::from_secs(self.config.catalog.cache_refresh_interval_seconds.min(5)));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                _ = tick_interval.tick() => {
                    if let Err(e) = self.scanner.tick(chrono::Utc::now()).await {
                        warn!(error = %e, "scanner tick failed");
                    }
                }
            }
        }

        self.books.stop();
        Ok(())
    }

    /// One-shot snapshot for the `status` subcommand.
    pub async fn status(&self) -> Result<StatusReport> {
        let now = chrono::Utc::now();
        let stats = self.catalog.stats();
        let open_brackets = self.risk.count_open_non_terminal().await?;
        let notional_today = self.risk.sum_estimated_notional_today().await?;
        let tradeable = self.catalog.tradeable(now, self.window);

        Ok(StatusReport {
            ws_connected: self.books.is_connected(),
            tradeable_markets: tradeable.len(),
            known_slugs: stats.known_slugs,
            trading_enabled: self.risk.trading_enabled(),
            open_brackets,
            estimated_notional_today: notional_today.to_string(),
        })
    }

    /// Aborted executions whose up-leg filled but whose down-leg never did —
    /// a human needs to manually close these out (§4.F.4).
    pub async fn unresolved(&self) -> Result<Vec<ExecutionRecord>> {
        self.store.list_unresolved_hedges().await
    }
}

/// Spawn a task that logs every telemetry [`Event`] at an appropriate level.
/// Used when the orchestrator is run with a [`ChannelTelemetrySink`] instead
/// of the default no-op sink (reserved for a future `--telemetry` flag).
#[allow(dead_code)]
pub fn spawn_event_logger(mut rx: tokio::sync::mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Event::Decision(d) => info!(slug = %d.slug, code = ?d.code, message = %d.message, "decision"),
                Event::Tick(t) => info!(tradeable = t.tradeable_markets, evaluated = t.evaluated_markets, actions = t.actions_taken, "tick"),
            }
        }
    })
}
