//! Telemetry Sink (§4.I) — fire-and-forget scan/decision/tick events. A
//! slow or unreachable telemetry backend must never slow the scanner down
//! (§5 "Telemetry must not throttle scanning"), so every publish is a
//! non-blocking channel send with a bounded, best-effort flush deadline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;

/// Why a bracket did or did not get acted on this tick (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionCode {
    NoTradeable,
    SkipOpenPosition,
    InvalidTokenIds,
    BookEmpty,
    NotFillable,
    SkipSizeZero,
    Actionable,
    EdgeTooSmall,
    ExecuteFailed,
    KillSwitch,
    Error,
}

/// One per bracket per tick.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub ts: DateTime<Utc>,
    pub slug: String,
    pub market_label: String,
    pub code: DecisionCode,
    pub message: String,
    pub edge_cents: Option<Decimal>,
    pub extra: Option<serde_json::Value>,
}

/// One per tick, aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Tick {
    pub ts: DateTime<Utc>,
    pub ws_connected: bool,
    pub last_message_age_sec: Option<f64>,
    pub event_driven: bool,
    pub tick_ms: u64,
    pub tradeable_markets: usize,
    pub evaluated_markets: usize,
    pub dirty_tokens: usize,
    pub gamma_calls: u64,
    pub clob_calls: u64,
    pub sidecar_posts: u64,
    pub edges_seen: usize,
    pub edges_actionable: usize,
    pub actions_taken: usize,
    pub last_error: Option<String>,
}

/// A structured event accepted by the sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Decision(Decision),
    Tick(Tick),
}

/// Fire-and-forget telemetry publisher. Publishing never awaits on I/O; a
/// background task owns the channel receiver and performs the actual
/// delivery (logging, HTTP post, etc.) under its own best-effort deadline.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: Event);

    fn decision(&self, decision: Decision) {
        self.publish(Event::Decision(decision));
    }

    fn tick(&self, tick: Tick) {
        self.publish(Event::Tick(tick));
    }
}

/// Default per-publish deadline (§4.I "very short timeout (≤ 400 ms)").
pub const PUBLISH_DEADLINE: Duration = Duration::from_millis(400);

/// Bounded mpsc-backed sink. A full channel silently drops the event rather
/// than block the scanner — telemetry is lossy by design (§5).
pub struct ChannelTelemetrySink {
    tx: mpsc::Sender<Event>,
}

impl ChannelTelemetrySink {
    /// Returns the sink and the receiving half; the caller spawns whatever
    /// drains `rx` (log lines, an HTTP sidecar post, a test collector).
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetrySink {
    fn publish(&self, event: Event) {
        // try_send never suspends; a full or closed channel just drops it.
        let _ = self.tx.try_send(event);
    }
}

/// Discards every event. Used when no telemetry backend is configured.
#[derive(Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn publish(&self, _event: Event) {}
}
