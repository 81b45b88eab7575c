//! Domain records shared across fetchers, storage and reporting.
//!
//! Snapshots are point-in-time rows for one (entity, day) key; they are
//! upserted, never appended.

use serde::{Deserialize, Serialize};

/// One appearance in the top-50-by-24h-trend listing for a given day.
/// Key: (slug, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSnapshot {
    pub id: i64,
    pub slug: String,
    pub day: String,
    pub symbol: String,
    pub name: String,
}

/// One ranked-listing row for a given day. Key: (slug, day); a refetch for
/// the same day overwrites the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub id: i64,
    pub slug: String,
    pub day: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub rank: i64,
    pub market_cap: f64,
    /// Semicolon-joined subset of the listing tags matching the fixed
    /// keyword set.
    pub tags: String,
}

/// Follower/watchlist counts for a watched asset on a given day.
/// Key: (crypto_id, day). Counts stay as the API's strings; `"0"` marks a
/// failed sub-call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySnapshot {
    pub crypto_id: i64,
    pub day: String,
    pub symbol: String,
    pub followers: String,
    pub watch_count: String,
}

/// A scraped social post. Key: id. `timestamp` is epoch seconds and is
/// preserved from the stored row when the same id is fetched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub conversation_id: String,
    pub author: String,
    pub user_id: String,
    pub text: String,
    pub permanent_url: String,
    pub is_reply: bool,
    pub is_retweet: bool,
    pub is_quoted: bool,
    pub is_pin: bool,
    pub likes: i64,
    pub replies: i64,
    pub reposts: i64,
    pub views: i64,
    pub mentions: i64,
    pub timestamp: i64,
}

/// Global market gauge. Cache-only with a fixed TTL; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicator {
    pub fear_greed_today: i64,
    pub fear_greed_yesterday: i64,
    pub btc_dominance: f64,
    pub total_market_cap: f64,
}

/// A statically configured cryptocurrency the digest reports on.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchedAsset {
    pub crypto_id: i64,
    pub symbol: String,
    pub handle: String,
    pub description: String,
}

/// A social account polled by the post fetcher.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialAccount {
    pub user_id: String,
    pub name: String,
    pub symbol: String,
}

/// One entry of the top-gainers ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gainer {
    pub symbol: String,
    pub price_change: f64,
    pub percent_change: f64,
}
