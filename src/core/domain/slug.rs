//! Bracket identifiers.
//!
//! A bracket is identified by the Unix-second timestamp of the start of its
//! 15-minute bucket. The slug is a deterministic, pure function of wall-clock
//! time; it performs no I/O and cannot fail.

use std::fmt;

/// Width of one bracket bucket, in seconds.
pub const BUCKET_SECONDS: i64 = 900;

const SLUG_PREFIX: &str = "btc-updown-15m-";

/// A bracket identifier: a 900-second-aligned Unix timestamp rendered as
/// `"btc-updown-15m-<secs>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slug(i64);

impl Slug {
    /// Construct a slug from an already-aligned bucket timestamp.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_secs` is not a multiple of [`BUCKET_SECONDS`]. Callers
    /// should go through [`Slug::for_timestamp`] or [`Slug::candidates`] unless
    /// the value is already known to be aligned.
    #[must_use]
    pub fn new(bucket_secs: i64) -> Self {
        assert_eq!(
            bucket_secs.rem_euclid(BUCKET_SECONDS),
            0,
            "bucket seconds must be 900-aligned"
        );
        Self(bucket_secs)
    }

    /// The bucket containing `now`, i.e. `floor(now / 900) * 900`.
    #[must_use]
    pub fn for_timestamp(now: i64) -> Self {
        Self(now.div_euclid(BUCKET_SECONDS) * BUCKET_SECONDS)
    }

    /// Deterministic candidate slugs around `now`, one per offset, in the
    /// given order with duplicates removed.
    ///
    /// Default offsets are `{0, -1, 1, 2}`, matching the current bucket, the
    /// previous one (still resolving), and the next two upcoming ones.
    #[must_use]
    pub fn candidates(now: i64, offsets: &[i64]) -> Vec<Self> {
        let base = Self::for_timestamp(now).0;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let secs = base + offset * BUCKET_SECONDS;
            if seen.insert(secs) {
                out.push(Self(secs));
            }
        }
        out
    }

    /// The underlying bucket-start Unix timestamp.
    #[must_use]
    pub const fn bucket_secs(&self) -> i64 {
        self.0
    }

    /// Parse a slug string of the form `"btc-updown-15m-<secs>"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let secs: i64 = s.strip_prefix(SLUG_PREFIX)?.parse().ok()?;
        (secs.rem_euclid(BUCKET_SECONDS) == 0).then_some(Self(secs))
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SLUG_PREFIX}{}", self.0)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_timestamp_aligns_down() {
        assert_eq!(Slug::for_timestamp(901).bucket_secs(), 900);
        assert_eq!(Slug::for_timestamp(900).bucket_secs(), 900);
        assert_eq!(Slug::for_timestamp(899).bucket_secs(), 0);
    }

    #[test]
    fn display_matches_expected_format() {
        let slug = Slug::new(1_800);
        assert_eq!(slug.to_string(), "btc-updown-15m-1800");
    }

    #[test]
    fn candidates_default_offsets_are_ordered_and_deduped() {
        let slugs = Slug::candidates(1_000, &[0, -1, 1, 2]);
        let secs: Vec<i64> = slugs.iter().map(Slug::bucket_secs).collect();
        assert_eq!(secs, vec![900, 0, 1800, 2700]);
    }

    #[test]
    fn candidates_dedup_when_offsets_collide() {
        let slugs = Slug::candidates(1_000, &[0, 0, 1]);
        assert_eq!(slugs.len(), 2);
    }

    #[test]
    fn parse_roundtrips_display() {
        let slug = Slug::new(2_700);
        assert_eq!(Slug::parse(&slug.to_string()), Some(slug));
    }

    #[test]
    fn parse_rejects_unaligned_or_malformed() {
        assert_eq!(Slug::parse("btc-updown-15m-901"), None);
        assert_eq!(Slug::parse("btc-updown-15m-abc"), None);
        assert_eq!(Slug::parse("not-a-slug"), None);
    }

    // P1: every emitted slug decodes to a bucket divisible by 900.
    #[test]
    fn property_bucket_alignment() {
        for now in [0_i64, 1, 899, 900, 901, 1_799, 1_800, 86_399, 1_753_700_000] {
            for slug in Slug::candidates(now, &[0, -1, 1, 2, -5, 10]) {
                assert_eq!(slug.bucket_secs().rem_euclid(BUCKET_SECONDS), 0);
            }
        }
    }
}
