//! In-memory TTL cache layer
//!
//! Shared mutable state between fetch/report cycles (writers) and delivery
//! channels (readers). Entries either expire after a fixed TTL or live until
//! overwritten.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::MarketIndicator;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() > at,
            None => false,
        }
    }
}

/// Expiring key-value store. `ttl: None` keeps the entry until it is
/// overwritten.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn insert(&self, key: &str, value: T, ttl: Option<Duration>) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    /// Get a value (None if expired or never set)
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read();
        entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Drop expired entries
    pub fn cleanup(&self) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| !entry.is_expired());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

const INDICATOR_KEY: &str = "market_indicator";
const REPORT_KEY: &str = "daily_report";

/// Market indicator cache. The TTL outlives the fetch interval so a failed
/// cycle keeps serving the previous value until it expires.
#[derive(Debug, Clone)]
pub struct IndicatorCache {
    cache: TtlCache<MarketIndicator>,
    ttl: Duration,
}

impl IndicatorCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            cache: TtlCache::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn store(&self, indicator: MarketIndicator) {
        self.cache.insert(INDICATOR_KEY, indicator, Some(self.ttl));
    }

    pub fn get(&self) -> Option<MarketIndicator> {
        self.cache.get(INDICATOR_KEY)
    }
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new(20 * 60)
    }
}

/// Rendered digest under one well-known key, overwritten on regeneration
/// rather than expired.
#[derive(Debug, Clone, Default)]
pub struct ReportCache {
    cache: TtlCache<String>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, digest: String) {
        self.cache.insert(REPORT_KEY, digest, None);
    }

    pub fn get(&self) -> Option<String> {
        self.cache.get(REPORT_KEY)
    }
}

/// Per-(symbol, day) dedup marks for trend alerts. The 25h TTL keeps a mark
/// alive across the day boundary it belongs to.
#[derive(Debug, Clone)]
pub struct AlertCache {
    cache: TtlCache<()>,
    ttl: Duration,
}

impl AlertCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            cache: TtlCache::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Marks (symbol, day) as alerted. Returns false if it already was.
    pub fn mark(&self, symbol: &str, day: &str) -> bool {
        let key = format!("{day}{symbol}");
        if self.cache.get(&key).is_some() {
            return false;
        }
        self.cache.insert(&key, (), Some(self.ttl));
        true
    }
}

impl Default for AlertCache {
    fn default() -> Self {
        Self::new(25 * 3600)
    }
}
