//! Book Aggregator — maintains a per-token order book snapshot, fed by a
//! streaming WebSocket subscription with a REST fallback (§4.C).
//!
//! Updates arrive on a single ingest task (spawned by [`BookAggregator::spawn`])
//! but are read concurrently by the scanner. Reads and writes are mutually
//! exclusive but short: the lock is never held across a suspension point. A
//! "dirty token set" records which tokens changed since the last drain; a
//! [`tokio::sync::Notify`] lets a reader block briefly for event-driven mode.

mod messages;

pub use messages::{BookEvent, MarketEvent, PriceChangeEntry, PriceChangeEvent, SubscribeMessage, WirePriceLevel};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::core::domain::{MarketBook, TokenId};
use crate::error::Result;
use messages::parse_levels;

pub const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";
pub const DEFAULT_CLOB_BASE_URL: &str = "https://clob.polymarket.com";

const MIN_BACKOFF_SECS: f64 = 1.0;
const MAX_BACKOFF_SECS: f64 = 20.0;
const BACKOFF_MULTIPLIER: f64 = 1.5;
const HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(10);

/// How stale a streaming snapshot may be before the scanner should use the
/// REST fallback instead (§4.C.2 default "freshness budget").
pub const DEFAULT_FRESHNESS_BUDGET_SECONDS: i64 = 5;

#[derive(Debug, Deserialize)]
struct RestBook {
    #[serde(default)]
    bids: Vec<WirePriceLevel>,
    #[serde(default)]
    asks: Vec<WirePriceLevel>,
}

struct Shared {
    books: RwLock<HashMap<TokenId, MarketBook>>,
    dirty: RwLock<HashSet<TokenId>>,
    working_set: RwLock<HashSet<TokenId>>,
    update_notify: Notify,
    stop_notify: Notify,
    connected: AtomicBool,
    stopped: AtomicBool,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
}

impl Shared {
    fn mark_dirty(&self, token: TokenId) {
        self.dirty.write().insert(token);
        self.update_notify.notify_waiters();
    }
}

/// Maintains live order books for the aggregator's working set of tokens.
pub struct BookAggregator {
    shared: Arc<Shared>,
    http: HttpClient,
    ws_url: String,
    clob_base_url: String,
}

impl BookAggregator {
    #[must_use]
    pub fn new(ws_url: impl Into<String>, clob_base_url: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                books: RwLock::new(HashMap::new()),
                dirty: RwLock::new(HashSet::new()),
                working_set: RwLock::new(HashSet::new()),
                update_notify: Notify::new(),
                stop_notify: Notify::new(),
                connected: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                last_message_at: RwLock::new(None),
            }),
            http: HttpClient::new(),
            ws_url: ws_url.into(),
            clob_base_url: clob_base_url.into(),
        }
    }

    /// Replace the set of tokens the ingest task should subscribe to. Takes
    /// effect on the next (re)connect.
    pub fn set_working_set(&self, tokens: impl IntoIterator<Item = TokenId>) {
        *self.shared.working_set.write() = tokens.into_iter().collect();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Seconds since the last message was received, for tick telemetry.
    #[must_use]
    pub fn last_message_age_seconds(&self, now: DateTime<Utc>) -> Option<f64> {
        self.shared.last_message_at.read().map(|ts| (now - ts).num_milliseconds() as f64 / 1_000.0)
    }

    /// A read-only clone of the current book for `token`, or `None` if no
    /// event has ever been observed for it.
    #[must_use]
    pub fn snapshot(&self, token: &TokenId) -> Option<MarketBook> {
        self.shared.books.read().get(token).cloned()
    }

    /// Atomically take and clear the dirty set.
    pub fn drain_dirty(&self) -> HashSet<TokenId> {
        std::mem::take(&mut *self.shared.dirty.write())
    }

    /// Block until either an update is signalled or `timeout` elapses.
    pub async fn wait_for_update(&self, timeout: StdDuration) {
        let _ = tokio::time::timeout(timeout, self.shared.update_notify.notified()).await;
    }

    /// Stop the ingest task: closes the socket and releases any blocked
    /// waiter. Idempotent.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.stop_notify.notify_waiters();
        self.shared.update_notify.notify_waiters();
    }

    /// Return the streaming snapshot for `token` if fresher than `freshness`,
    /// otherwise fall back to a REST fetch (§4.C.2).
    pub async fn ensure_fresh(&self, token: &TokenId, freshness: Duration, now: DateTime<Utc>) -> Result<MarketBook> {
        if let Some(book) = self.snapshot(token) {
            if now - book.last_update_ts() <= freshness {
                return Ok(book);
            }
        }
        self.fetch_rest(token).await
    }

    /// Directly seed a snapshot, bypassing both ingress paths. Used by
    /// tests that need a deterministic book without a live socket or
    /// server.
    #[cfg(any(test, feature = "testkit"))]
    pub fn seed_snapshot(&self, book: MarketBook) {
        let token = book.token_id().clone();
        self.shared.books.write().insert(token.clone(), book);
        self.shared.mark_dirty(token);
    }

    /// Unconditional REST fetch, used as the initial population for a token
    /// the streaming path has not yet produced a snapshot for.
    pub async fn fetch_rest(&self, token: &TokenId) -> Result<MarketBook> {
        let url = format!("{}/book?token_id={}", self.clob_base_url, token.as_str());
        let body: RestBook = self.http.get(&url).send().await?.json().await?;
        let ts = Utc::now();
        let mut book = MarketBook::new(token.clone());
        book.replace_book(parse_levels(&body.bids), parse_levels(&body.asks), ts);
        self.shared.books.write().insert(token.clone(), book.clone());
        self.shared.mark_dirty(token.clone());
        Ok(book)
    }

    /// Spawn the ingest task. Runs until [`BookAggregator::stop`] is called;
    /// reconnects with exponential backoff (1s, capped at 20s) on any
    /// disconnect or connect failure (§4.C.1).
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let shared = self.shared.clone();
        let ws_url = self.ws_url.clone();
        tokio::spawn(run_ingest_loop(shared, ws_url))
    }

    /// Parse and apply one raw text frame; exposed directly so the merge
    /// semantics can be exercised without a live socket.
    fn ingest_text(shared: &Shared, text: &str) {
        if text == "PING" || text == "PONG" {
            return;
        }
        match serde_json::from_str::<MarketEvent>(text) {
            Ok(MarketEvent::Book(ev)) => apply_book_event(shared, ev),
            Ok(MarketEvent::PriceChange(ev)) => apply_price_change_event(shared, ev),
            Ok(MarketEvent::Unknown) => {}
            Err(e) => warn!(error = %e, raw = %text, "dropping unparseable market event"),
        }
        *shared.last_message_at.write() = Some(Utc::now());
    }
}

fn apply_book_event(shared: &Shared, ev: BookEvent) {
    let token = TokenId::new(ev.asset_id.clone());
    let ts = ev.ts();
    let bids = parse_levels(&ev.bids);
    let asks = parse_levels(&ev.asks);
    {
        let mut books = shared.books.write();
        let book = books.entry(token.clone()).or_insert_with(|| MarketBook::new(token.clone()));
        book.replace_book(bids, asks, ts);
    }
    shared.mark_dirty(token);
}

fn apply_price_change_event(shared: &Shared, ev: PriceChangeEvent) {
    let ts = ev.ts();
    let mut touched = Vec::new();
    {
        let mut books = shared.books.write();
        for entry in ev.price_changes {
            let Some(side) = entry.side() else {
                warn!(side = %entry.side, "dropping price_change with unrecognized side");
                continue;
            };
            let Some(price) = entry.price() else {
                warn!(raw_price = %entry.price, "dropping price_change with unparseable price");
                continue;
            };
            let token = entry.token_id();
            let book = books.entry(token.clone()).or_insert_with(|| MarketBook::new(token.clone()));
            book.apply_price_change(side, price, entry.size(), ts);
            touched.push(token);
        }
    }
    for token in touched {
        shared.mark_dirty(token);
    }
}

async fn run_ingest_loop(shared: Arc<Shared>, ws_url: String) {
    let mut backoff_secs = MIN_BACKOFF_SECS;

    while !shared.stopped.load(Ordering::Acquire) {
        match connect_and_stream(&shared, &ws_url).await {
            Ok(()) => backoff_secs = MIN_BACKOFF_SECS,
            Err(e) => warn!(error = %e, "book aggregator stream ended with error"),
        }

        shared.connected.store(false, Ordering::Release);
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        let delay = backoff_secs;
        backoff_secs = (backoff_secs * BACKOFF_MULTIPLIER).min(MAX_BACKOFF_SECS);
        info!(delay_secs = delay, "reconnecting book aggregator stream");
        tokio::select! {
            () = sleep(StdDuration::from_secs_f64(delay)) => {}
            () = shared.stop_notify.notified() => break,
        }
    }
}

async fn connect_and_stream(shared: &Arc<Shared>, ws_url: &str) -> Result<()> {
    let (ws, _response) = tokio_tungstenite::connect_async(ws_url).await?;
    let (mut write, mut read) = ws.split();

    let asset_ids: Vec<String> = shared.working_set.read().iter().map(|t| t.as_str().to_string()).collect();
    let sub = SubscribeMessage::new(asset_ids);
    write.send(Message::Text(serde_json::to_string(&sub)?)).await?;
    shared.connected.store(true, Ordering::Release);
    info!("book aggregator subscribed");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            () = shared.stop_notify.notified() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                if write.send(Message::Text("PING".to_string())).await.is_err() {
                    return Ok(());
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(raw = %text, "book aggregator frame");
                        BookAggregator::ingest_text(shared, &text);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if write.send(Message::Pong(payload)).await.is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "book aggregator stream closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
        }
    }
}
