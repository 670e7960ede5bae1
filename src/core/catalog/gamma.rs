//! Gamma REST client — fetches bracket metadata by slug.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::extract_token_ids;
use crate::core::domain::{MarketMetadata, Slug};
use crate::error::Result;

pub const DEFAULT_GAMMA_BASE_URL: &str = "https://gamma-api.polymarket.com";

/// Source of truth for per-slug bracket metadata. Implemented over HTTP in
/// production, faked in tests (§4.B).
#[async_trait]
pub trait GammaClient: Send + Sync {
    /// Resolve metadata for one slug. `Ok(None)` means the slug does not
    /// (yet) exist upstream — not an error, and never cached as a negative.
    async fn fetch_market(&self, slug: Slug) -> Result<Option<MarketMetadata>>;
}

/// HTTP-backed [`GammaClient`] against the Gamma events/markets API.
pub struct HttpGammaClient {
    http: HttpClient,
    base_url: String,
}

impl HttpGammaClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: HttpClient::new(), base_url: base_url.into() }
    }
}

impl Default for HttpGammaClient {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA_BASE_URL)
    }
}

#[derive(Debug, Deserialize)]
struct GammaMarket {
    #[serde(rename = "conditionId", default)]
    condition_id: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(rename = "endDate", default)]
    end_date: Option<String>,
    #[serde(default)]
    outcomes: Option<Value>,
    #[serde(rename = "clobTokenIds", default)]
    clob_token_ids: Option<Value>,
    #[serde(default)]
    volume: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GammaEvent {
    #[serde(default)]
    slug: Option<String>,
    #[serde(rename = "endDate", default)]
    end_date: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    markets: Option<Vec<GammaMarket>>,
}

/// Parse a Gamma `endDate` string, accepting the `Z` UTC suffix the API uses
/// in place of an explicit offset.
fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.strip_suffix('Z').map_or_else(|| raw.to_string(), |s| format!("{s}+00:00"));
    DateTime::parse_from_rfc3339(&normalized).map(|dt| dt.with_timezone(&Utc)).ok()
}

fn outcome_labels(outcomes: Option<&Value>) -> (String, String) {
    match outcomes {
        Some(Value::Array(items)) if items.len() >= 2 => {
            let up = items[0].as_str().unwrap_or("Up").to_string();
            let down = items[1].as_str().unwrap_or("Down").to_string();
            (up, down)
        }
        _ => ("Up".to_string(), "Down".to_string()),
    }
}

fn market_to_metadata(slug: Slug, event_title: Option<&str>, event_end: Option<&str>, m: &GammaMarket) -> Option<MarketMetadata> {
    let end_date_str = m.end_date.as_deref().or(event_end)?;
    let end_time = parse_end_date(end_date_str)?;

    let question = m.question.clone().or_else(|| event_title.map(str::to_string)).unwrap_or_else(|| slug.to_string());
    let (up_label, down_label) = outcome_labels(m.outcomes.as_ref());

    // §4.B: a record with fewer than two usable token IDs is rejected, not
    // defaulted — there is no safe placeholder for a tradeable token id.
    let (up_token, down_token) = m.clob_token_ids.as_ref().and_then(extract_token_ids)?;

    let volume = m
        .volume
        .as_ref()
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0.0);

    Some(MarketMetadata::new(slug, m.condition_id.clone(), question, end_time, up_label, down_label, up_token, down_token, volume))
}

#[async_trait]
impl GammaClient for HttpGammaClient {
    async fn fetch_market(&self, slug: Slug) -> Result<Option<MarketMetadata>> {
        let events_url = format!("{}/events?slug={}", self.base_url, slug);
        let events: Vec<GammaEvent> = self.http.get(&events_url).send().await?.json().await?;

        let Some(event) = events.into_iter().find(|e| e.slug.as_deref() == Some(&slug.to_string())) else {
            debug!(%slug, "no event found for slug");
            return Ok(None);
        };

        if let Some(markets) = &event.markets {
            if let Some(m) = markets.first() {
                return Ok(market_to_metadata(slug, event.title.as_deref(), event.end_date.as_deref(), m));
            }
        }

        let markets_url = format!("{}/markets?slug={}", self.base_url, slug);
        let markets: Vec<GammaMarket> = self.http.get(&markets_url).send().await?.json().await?;
        let Some(m) = markets.first() else {
            debug!(%slug, "no market found for slug");
            return Ok(None);
        };

        Ok(market_to_metadata(slug, event.title.as_deref(), event.end_date.as_deref(), m))
    }
}
