//! Market metadata cached by the catalog.

use std::fmt;

use chrono::{DateTime, Utc};

use super::Slug;

/// A CLOB token/outcome identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(String);

impl TokenId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TokenId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immutable, cached metadata for one bracket, as resolved by the catalog.
///
/// Created once when a slug is first discovered; never mutated afterward
/// (the catalog's `last_seen` bookkeeping lives outside this value).
#[derive(Debug, Clone, PartialEq)]
pub struct MarketMetadata {
    slug: Slug,
    condition_id: String,
    question: String,
    end_time: DateTime<Utc>,
    up_label: String,
    down_label: String,
    up_token: TokenId,
    down_token: TokenId,
    initial_volume: f64,
}

impl MarketMetadata {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slug: Slug,
        condition_id: impl Into<String>,
        question: impl Into<String>,
        end_time: DateTime<Utc>,
        up_label: impl Into<String>,
        down_label: impl Into<String>,
        up_token: TokenId,
        down_token: TokenId,
        initial_volume: f64,
    ) -> Self {
        Self {
            slug,
            condition_id: condition_id.into(),
            question: question.into(),
            end_time,
            up_label: up_label.into(),
            down_label: down_label.into(),
            up_token,
            down_token,
            initial_volume,
        }
    }

    #[must_use]
    pub const fn slug(&self) -> Slug {
        self.slug
    }

    #[must_use]
    pub fn condition_id(&self) -> &str {
        &self.condition_id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    #[must_use]
    pub fn up_label(&self) -> &str {
        &self.up_label
    }

    #[must_use]
    pub fn down_label(&self) -> &str {
        &self.down_label
    }

    #[must_use]
    pub const fn up_token(&self) -> &TokenId {
        &self.up_token
    }

    #[must_use]
    pub const fn down_token(&self) -> &TokenId {
        &self.down_token
    }

    #[must_use]
    pub const fn initial_volume(&self) -> f64 {
        self.initial_volume
    }

    #[must_use]
    pub fn token_ids(&self) -> [&TokenId; 2] {
        [&self.up_token, &self.down_token]
    }

    /// Minutes remaining until `end_time`, relative to `now`, clamped to 0.
    #[must_use]
    pub fn minutes_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        (self.end_time - now).num_milliseconds() as f64 / 60_000.0
    }

    /// Seconds remaining until `end_time`, relative to `now`, clamped to 0.
    #[must_use]
    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        ((self.end_time - now).num_milliseconds() as f64 / 1_000.0).max(0.0)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }
}

/// Normalize an exchange-supplied token ID payload into a list of non-empty
/// strings, preserving input order for list inputs.
///
/// The exchange sometimes returns `clobTokenIds` as a JSON-encoded string
/// (e.g. `"[\"123\",\"456\"]"`); treating it as an iterable string instead of
/// decoding it first would yield per-character garbage. This accepts a raw
/// JSON string, decodes it if it parses as JSON, and otherwise falls back to
/// treating it as a single bare token.
#[must_use]
pub fn normalize_token_ids(raw: &serde_json::Value) -> Vec<String> {
    fn strip(token: &str) -> Option<String> {
        let trimmed = token.trim().trim_matches('"');
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    match raw {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(decoded) => normalize_token_ids(&decoded),
                Err(_) => strip(trimmed).into_iter().collect(),
            }
        }
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => strip(s),
                other => strip(&other.to_string()),
            })
            .collect(),
        other => strip(&other.to_string()).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_accessors() {
        let meta = MarketMetadata::new(
            Slug::new(900),
            "cond-1",
            "Will BTC be up?",
            Utc::now() + chrono::Duration::minutes(10),
            "Up",
            "Down",
            TokenId::new("up-1"),
            TokenId::new("down-1"),
            1_234.5,
        );
        assert_eq!(meta.condition_id(), "cond-1");
        assert_eq!(meta.up_token().as_str(), "up-1");
        assert_eq!(meta.down_token().as_str(), "down-1");
        assert!(meta.minutes_to_expiry(Utc::now()) > 9.0);
        assert!(!meta.is_expired(Utc::now()));
    }

    #[test]
    fn is_expired_once_end_time_passed() {
        let meta = MarketMetadata::new(
            Slug::new(900),
            "cond-1",
            "q",
            Utc::now() - chrono::Duration::minutes(1),
            "Up",
            "Down",
            TokenId::new("u"),
            TokenId::new("d"),
            0.0,
        );
        assert!(meta.is_expired(Utc::now()));
    }

    // P2: normalization only ever yields non-empty strings.
    #[test]
    fn normalize_handles_array() {
        let got = normalize_token_ids(&json!(["123", "456"]));
        assert_eq!(got, vec!["123".to_string(), "456".to_string()]);
    }

    #[test]
    fn normalize_handles_json_encoded_string() {
        let got = normalize_token_ids(&json!("[\"123\",\"456\"]"));
        assert_eq!(got, vec!["123".to_string(), "456".to_string()]);
    }

    #[test]
    fn normalize_handles_bare_scalar_string() {
        let got = normalize_token_ids(&json!("123"));
        assert_eq!(got, vec!["123".to_string()]);
    }

    #[test]
    fn normalize_drops_nulls_and_empties() {
        let got = normalize_token_ids(&json!([null, "", "  ", "789"]));
        assert_eq!(got, vec!["789".to_string()]);
    }

    #[test]
    fn normalize_null_is_empty() {
        assert!(normalize_token_ids(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn normalize_preserves_order() {
        let got = normalize_token_ids(&json!(["c", "a", "b"]));
        assert_eq!(got, vec!["c".to_string(), "a".to_string(), "b".to_string()]);
    }
}
