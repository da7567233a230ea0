use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone as _, Utc};

use crate::formats::RawPost;

pub const DEFAULT_MAX_POSTS: usize = 7;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_MIN_CHARS: usize = 100;

/// Bounds applied to what a source returns before anything is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub max_posts: usize,
    pub lookback_days: i64,
    pub min_chars: usize,
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            max_posts: DEFAULT_MAX_POSTS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

impl FetchWindow {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.lookback_days)
    }
}

#[async_trait]
pub trait PostSource: Send {
    /// Returns the digest candidates published inside `window`, newest first.
    async fn fetch_posts(
        &mut self,
        window: &FetchWindow,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RawPost>>;
}

/// Applies the per-run cap, then the recency and content-richness filters.
pub fn select_candidates(
    posts: Vec<RawPost>,
    window: &FetchWindow,
    now: DateTime<Utc>,
) -> Vec<RawPost> {
    let cutoff = window.cutoff(now);
    posts
        .into_iter()
        .take(window.max_posts)
        .filter(|post| {
            if post.published_at < cutoff {
                tracing::debug!(
                    post = %post.permalink,
                    published_at = %post.published_at,
                    "older than lookback window"
                );
                return false;
            }
            if post.text.chars().count() < window.min_chars {
                tracing::debug!(post = %post.permalink, "too short for a digest");
                return false;
            }
            if !crate::extract::contains_url(&post.text) {
                tracing::debug!(post = %post.permalink, "no link; not a digest");
                return false;
            }
            true
        })
        .collect()
}

/// Activity ids carry their creation time in the upper 41 bits (milliseconds since the epoch).
pub fn activity_timestamp(urn: &str) -> Option<DateTime<Utc>> {
    let id = urn.rsplit(':').next()?.trim().parse::<u64>().ok()?;
    let millis = i64::try_from(id >> 22).ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

pub fn activity_permalink(urn: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{urn}/")
}

/// Turns a scraped post card into a `RawPost`, falling back to `now` when the URN has no usable id.
pub fn post_from_card(urn: &str, text: &str, now: DateTime<Utc>) -> RawPost {
    let published_at = activity_timestamp(urn).unwrap_or_else(|| {
        tracing::debug!(urn, "cannot decode activity timestamp; using run time");
        now
    });
    RawPost {
        text: text.trim().to_owned(),
        published_at,
        permalink: activity_permalink(urn),
    }
}
