//! Market Catalog — the active-set cache of tradeable brackets.
//!
//! Arena-indexed: metadata lives in a vector, `slug -> index` and
//! `token -> index` live in side maps. Pruning retains indices (tombstones)
//! rather than shifting the vector, so `token_index` never dangles.

pub mod gamma;

pub use gamma::{GammaClient, HttpGammaClient};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::domain::{normalize_token_ids, MarketMetadata, Slug, TokenId};
use crate::error::Result;

/// Default tradeable window, per spec §6.
pub const DEFAULT_TRADEABLE_MIN_MINUTES: f64 = 2.0;
pub const DEFAULT_TRADEABLE_MAX_MINUTES: f64 = 14.0;
pub const DEFAULT_NO_TRADE_TAIL_SECONDS: f64 = 90.0;

/// Default bucket offsets scanned each refresh: current, previous, next two.
pub const DEFAULT_BUCKET_OFFSETS: [i64; 4] = [0, -1, 1, 2];

/// Window thresholds the catalog classifies brackets against.
#[derive(Debug, Clone, Copy)]
pub struct TradeableWindow {
    pub min_minutes: f64,
    pub max_minutes: f64,
    pub no_trade_tail_seconds: f64,
}

impl Default for TradeableWindow {
    fn default() -> Self {
        Self {
            min_minutes: DEFAULT_TRADEABLE_MIN_MINUTES,
            max_minutes: DEFAULT_TRADEABLE_MAX_MINUTES,
            no_trade_tail_seconds: DEFAULT_NO_TRADE_TAIL_SECONDS,
        }
    }
}

/// Point-in-time counters for dashboards/telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStats {
    pub cached: usize,
    pub known_slugs: usize,
    pub refresh_count: u64,
    pub new_slugs_found: u64,
    pub expired_removed: u64,
}

#[derive(Default)]
struct Arena {
    entries: Vec<Option<MarketMetadata>>,
    by_slug: HashMap<Slug, usize>,
    by_token: HashMap<TokenId, usize>,
    known_slugs: std::collections::HashSet<Slug>,
    last_seen: HashMap<Slug, DateTime<Utc>>,
    refresh_count: u64,
    new_slugs_found: u64,
    expired_removed: u64,
}

impl Arena {
    fn insert(&mut self, meta: MarketMetadata, now: DateTime<Utc>) {
        let slug = meta.slug();
        let idx = self.entries.len();
        for token in meta.token_ids() {
            self.by_token.insert(token.clone(), idx);
        }
        self.by_slug.insert(slug, idx);
        self.known_slugs.insert(slug);
        self.last_seen.insert(slug, now);
        self.entries.push(Some(meta));
        self.new_slugs_found += 1;
    }

    fn get(&self, slug: Slug) -> Option<&MarketMetadata> {
        self.by_slug.get(&slug).and_then(|&i| self.entries[i].as_ref())
    }

    fn touch(&mut self, slug: Slug, now: DateTime<Utc>) {
        self.last_seen.insert(slug, now);
    }
}

/// Resolves and caches `MarketMetadata` for the small set of currently
/// tradeable brackets. Unknown or empty lookups are skipped, never cached as
/// negatives (§4.B).
pub struct MarketCatalog {
    client: Box<dyn GammaClient>,
    arena: RwLock<Arena>,
}

impl MarketCatalog {
    #[must_use]
    pub fn new(client: Box<dyn GammaClient>) -> Self {
        Self { client, arena: RwLock::new(Arena::default()) }
    }

    /// Resolve metadata for `slugs`. Seen slugs are touched (last-seen bumped,
    /// no re-fetch); unseen slugs are queried and cached on success.
    pub async fn resolve(&self, slugs: &[Slug], now: DateTime<Utc>) -> Result<Vec<MarketMetadata>> {
        let mut out = Vec::with_capacity(slugs.len());
        let mut to_fetch = Vec::new();

        {
            let mut arena = self.arena.write();
            for &slug in slugs {
                if let Some(meta) = arena.get(slug).cloned() {
                    arena.touch(slug, now);
                    out.push(meta);
                } else {
                    to_fetch.push(slug);
                }
            }
        }

        for slug in to_fetch {
            match self.client.fetch_market(slug).await {
                Ok(Some(meta)) => {
                    info!(%slug, minutes_to_expiry = meta.minutes_to_expiry(now), "new market cached");
                    let mut arena = self.arena.write();
                    arena.insert(meta.clone(), now);
                    out.push(meta);
                }
                Ok(None) => {
                    debug!(%slug, "gamma lookup returned nothing, not caching a negative");
                }
                Err(e) => {
                    warn!(%slug, error = %e, "gamma lookup failed");
                }
            }
        }

        self.arena.write().refresh_count += 1;
        Ok(out)
    }

    /// Refresh using the deterministic candidate slugs around `now` (§4.A),
    /// avoiding the "latest events" failure mode where far-future
    /// pre-created buckets crowd out the bucket actually trading now.
    pub async fn refresh_deterministic(&self, now: DateTime<Utc>, offsets: &[i64]) -> Result<usize> {
        let slugs = Slug::candidates(now.timestamp(), offsets);
        let before = self.arena.read().new_slugs_found;
        self.resolve(&slugs, now).await?;
        let after = self.arena.read().new_slugs_found;
        self.prune(now);
        Ok((after - before) as usize)
    }

    /// Brackets whose expiry falls in the tradeable window (§4.B).
    #[must_use]
    pub fn tradeable(&self, now: DateTime<Utc>, window: TradeableWindow) -> HashMap<Slug, MarketMetadata> {
        let arena = self.arena.read();
        arena
            .entries
            .iter()
            .flatten()
            .filter(|m| {
                let minutes = m.minutes_to_expiry(now);
                let seconds = m.seconds_to_expiry(now);
                minutes >= window.min_minutes && minutes <= window.max_minutes && seconds > window.no_trade_tail_seconds
            })
            .map(|m| (m.slug(), m.clone()))
            .collect()
    }

    /// Brackets expiring soon but outside the tradeable window — useful for
    /// monitoring dashboards, not acted on by the scanner.
    #[must_use]
    pub fn upcoming(&self, now: DateTime<Utc>, window: TradeableWindow) -> HashMap<Slug, MarketMetadata> {
        let arena = self.arena.read();
        arena
            .entries
            .iter()
            .flatten()
            .filter(|m| m.minutes_to_expiry(now) > window.max_minutes)
            .map(|m| (m.slug(), m.clone()))
            .collect()
    }

    /// Drop metadata whose `end_time` has passed. Tombstones the arena slot
    /// rather than shifting indices so `by_token` stays valid.
    pub fn prune(&self, now: DateTime<Utc>) {
        let mut arena = self.arena.write();
        let expired: Vec<(Slug, usize)> = arena
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().filter(|m| m.is_expired(now)).map(|m| (m.slug(), i)))
            .collect();

        for (slug, idx) in expired {
            if let Some(meta) = arena.entries[idx].take() {
                for token in meta.token_ids() {
                    arena.by_token.remove(token);
                }
            }
            arena.by_slug.remove(&slug);
            arena.last_seen.remove(&slug);
            arena.expired_removed += 1;
        }
    }

    #[must_use]
    pub fn get(&self, slug: Slug) -> Option<MarketMetadata> {
        self.arena.read().get(slug).cloned()
    }

    #[must_use]
    pub fn slug_for_token(&self, token: &TokenId) -> Option<Slug> {
        let arena = self.arena.read();
        arena.by_token.get(token).and_then(|&i| arena.entries[i].as_ref()).map(MarketMetadata::slug)
    }

    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        let arena = self.arena.read();
        CatalogStats {
            cached: arena.entries.iter().flatten().count(),
            known_slugs: arena.known_slugs.len(),
            refresh_count: arena.refresh_count,
            new_slugs_found: arena.new_slugs_found,
            expired_removed: arena.expired_removed,
        }
    }
}

/// Extract non-empty token IDs from a market payload, tolerating Gamma's
/// three encodings (§4.B); rejects records with fewer than two usable IDs.
#[must_use]
pub fn extract_token_ids(clob_token_ids: &serde_json::Value) -> Option<(TokenId, TokenId)> {
    let ids = normalize_token_ids(clob_token_ids);
    let mut iter = ids.into_iter();
    let up = iter.next()?;
    let down = iter.next()?;
    Some((TokenId::new(up), TokenId::new(down)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeGamma {
        calls: Arc<AtomicUsize>,
        response: Option<MarketMetadata>,
    }

    #[async_trait]
    impl GammaClient for FakeGamma {
        async fn fetch_market(&self, _slug: Slug) -> Result<Option<MarketMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn meta(slug: Slug, minutes_to_expiry: i64) -> MarketMetadata {
        MarketMetadata::new(
            slug,
            "cond-1",
            "Will BTC be up?",
            Utc::now() + Duration::minutes(minutes_to_expiry),
            "Up",
            "Down",
            TokenId::new("up-1"),
            TokenId::new("down-1"),
            1_000.0,
        )
    }

    #[tokio::test]
    async fn resolve_fetches_unseen_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slug = Slug::new(900);
        let client = FakeGamma { calls: calls.clone(), response: Some(meta(slug, 10)) };
        let catalog = MarketCatalog::new(Box::new(client));

        let now = Utc::now();
        let got = catalog.resolve(&[slug], now).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second resolve for the same slug must not refetch.
        let got2 = catalog.resolve(&[slug], now).await.unwrap();
        assert_eq!(got2.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_skips_unknown_without_caching_negative() {
        let client = FakeGamma { calls: Arc::new(AtomicUsize::new(0)), response: None };
        let catalog = MarketCatalog::new(Box::new(client));
        let got = catalog.resolve(&[Slug::new(900)], Utc::now()).await.unwrap();
        assert!(got.is_empty());
        assert_eq!(catalog.stats().cached, 0);
    }

    #[tokio::test]
    async fn tradeable_applies_window_and_tail() {
        let slug = Slug::new(900);
        let client = FakeGamma { calls: Arc::new(AtomicUsize::new(0)), response: Some(meta(slug, 10)) };
        let catalog = MarketCatalog::new(Box::new(client));
        let now = Utc::now();
        catalog.resolve(&[slug], now).await.unwrap();

        let tradeable = catalog.tradeable(now, TradeableWindow::default());
        assert_eq!(tradeable.len(), 1);

        // Outside the 2-14 minute window.
        let far_window = TradeableWindow { min_minutes: 2.0, max_minutes: 5.0, no_trade_tail_seconds: 90.0 };
        assert!(catalog.tradeable(now, far_window).is_empty());
    }

    #[tokio::test]
    async fn prune_removes_expired_and_tokens() {
        let slug = Slug::new(900);
        let client = FakeGamma { calls: Arc::new(AtomicUsize::new(0)), response: Some(meta(slug, -1)) };
        let catalog = MarketCatalog::new(Box::new(client));
        let now = Utc::now();
        catalog.resolve(&[slug], now).await.unwrap();
        assert_eq!(catalog.stats().cached, 1);

        catalog.prune(now);
        assert_eq!(catalog.stats().cached, 0);
        assert!(catalog.slug_for_token(&TokenId::new("up-1")).is_none());
    }

    #[test]
    fn extract_token_ids_requires_at_least_two() {
        assert!(extract_token_ids(&serde_json::json!(["only-one"])).is_none());
        let (up, down) = extract_token_ids(&serde_json::json!(["a", "b"])).unwrap();
        assert_eq!(up.as_str(), "a");
        assert_eq!(down.as_str(), "b");
    }
}
