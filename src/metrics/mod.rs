//! Derived metrics
//!
//! Pure computations over persisted snapshots (percentage moves, gainer
//! ranking, summary sentences) plus `MetricsEngine`, the query-backed
//! surface the report and delivery layers read from. Absent rows surface as
//! `None`/`false`, never as errors; a missing snapshot just suppresses the
//! metric.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dates;
use crate::error::Result;
use crate::storage::Database;
use crate::types::{CommunitySnapshot, Gainer, HistoricalSnapshot};

/// Percentage change from `p2` to `p1`. Undefined when `p2` is zero.
pub fn percent_change(p1: f64, p2: f64) -> Option<f64> {
    if p2 == 0.0 {
        return None;
    }
    Some((p1 - p2) / p2 * 100.0)
}

/// Join two days' snapshots on symbol, keep positive moves only, sort
/// strictly descending, return the top 3. Symbols missing either day are
/// not eligible.
pub fn rank_gainers(
    yesterday: &[HistoricalSnapshot],
    two_days_ago: &[HistoricalSnapshot],
) -> Vec<Gainer> {
    let old_prices: HashMap<&str, f64> = two_days_ago
        .iter()
        .map(|s| (s.symbol.as_str(), s.price))
        .collect();

    let mut gainers: Vec<Gainer> = yesterday
        .iter()
        .filter_map(|snapshot| {
            let old_price = *old_prices.get(snapshot.symbol.as_str())?;
            let change = percent_change(snapshot.price, old_price)?;
            (change > 0.0).then(|| Gainer {
                symbol: snapshot.symbol.clone(),
                price_change: snapshot.price - old_price,
                percent_change: change,
            })
        })
        .collect();

    gainers.sort_by(|a, b| {
        b.percent_change
            .partial_cmp(&a.percent_change)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    gainers.truncate(3);
    gainers
}

/// One-sentence two-day summary: stable within ±2%, bullish above, bearish
/// below.
pub fn token_sentence(symbol: &str, price_yesterday: f64, price_two_days_ago: f64) -> String {
    let change = percent_change(price_yesterday, price_two_days_ago).unwrap_or(0.0);
    let token = format!("${symbol}");

    if change.abs() <= 2.0 {
        format!(
            "{token} remains stable at ${price_yesterday:.0}, with a slight {change:.2}% move over the past two days."
        )
    } else if change > 2.0 {
        format!(
            "{token} continues its bullish momentum, rising to ${price_yesterday:.0} (+{change:.2}%) in the last two days."
        )
    } else {
        format!(
            "{token} is facing some pressure, dropping to ${price_yesterday:.0} (-{:.2}%) over the last two days.",
            change.abs()
        )
    }
}

/// Thousands-separated rendering with two decimals, for market caps.
pub fn format_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{grouped}.{frac:02}", if negative { "-" } else { "" })
}

/// Query surface over the snapshot store, anchored on yesterday the way the
/// daily report is.
pub struct MetricsEngine {
    db: Arc<Database>,
}

impl MetricsEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// True iff a trending snapshot exists for (symbol, day) with a
    /// non-empty name.
    pub async fn is_trendy(&self, symbol: &str, day: &str) -> bool {
        match self.db.trending_at_day(symbol, day).await {
            Ok(Some(snapshot)) => !snapshot.name.is_empty(),
            Ok(None) => false,
            Err(e) => {
                tracing::error!(symbol, day, "trending lookup failed: {e}");
                false
            }
        }
    }

    pub async fn is_trendy_today(&self, symbol: &str) -> bool {
        self.is_trendy(symbol, &dates::today()).await
    }

    pub async fn is_trendy_yesterday(&self, symbol: &str) -> bool {
        self.is_trendy(symbol, &dates::yesterday()).await
    }

    pub async fn for_symbol_yesterday(&self, symbol: &str) -> Result<Option<HistoricalSnapshot>> {
        self.db
            .historical_for_symbol_day(symbol, &dates::yesterday())
            .await
    }

    pub async fn for_symbol_two_days_ago(
        &self,
        symbol: &str,
    ) -> Result<Option<HistoricalSnapshot>> {
        self.db
            .historical_for_symbol_day(symbol, &dates::days_ago(2))
            .await
    }

    /// Seven days before yesterday, i.e. today minus eight, since the report is
    /// anchored on yesterday's data.
    pub async fn for_symbol_seven_days_ago(
        &self,
        symbol: &str,
    ) -> Result<Option<HistoricalSnapshot>> {
        self.db
            .historical_for_symbol_day(symbol, &dates::days_ago(8))
            .await
    }

    pub async fn community_yesterday(&self, crypto_id: i64) -> Result<Option<CommunitySnapshot>> {
        self.db
            .community_for_day(crypto_id, &dates::yesterday())
            .await
    }

    /// Top gainers between the day before yesterday and yesterday. Both
    /// days' sets are loaded in full; symbols present in only one are
    /// skipped by the join.
    pub async fn top_gainers(&self) -> Result<Vec<Gainer>> {
        let yesterday = self.db.historical_for_day(&dates::yesterday()).await?;
        let two_days_ago = self.db.historical_for_day(&dates::days_ago(2)).await?;
        Ok(rank_gainers(&yesterday, &two_days_ago))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendingSnapshot;

    fn snapshot(symbol: &str, day: &str, price: f64) -> HistoricalSnapshot {
        HistoricalSnapshot {
            id: 1,
            slug: symbol.to_lowercase(),
            day: day.to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price,
            rank: 1,
            market_cap: 0.0,
            tags: String::new(),
        }
    }

    #[test]
    fn test_percent_change_up_and_down() {
        assert_eq!(percent_change(110.0, 100.0), Some(10.0));
        assert_eq!(percent_change(90.0, 100.0), Some(-10.0));
    }

    #[test]
    fn test_percent_change_zero_base_is_undefined() {
        assert_eq!(percent_change(42.0, 0.0), None);
    }

    #[test]
    fn test_rank_gainers_excludes_losers() {
        let yesterday = vec![snapshot("BTC", "d1", 110.0), snapshot("ETH", "d1", 90.0)];
        let two_days = vec![snapshot("BTC", "d0", 100.0), snapshot("ETH", "d0", 100.0)];

        let gainers = rank_gainers(&yesterday, &two_days);
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].symbol, "BTC");
        assert_eq!(gainers[0].percent_change, 10.0);
        assert_eq!(gainers[0].price_change, 10.0);
    }

    #[test]
    fn test_rank_gainers_requires_both_days() {
        let yesterday = vec![snapshot("BTC", "d1", 110.0), snapshot("NEW", "d1", 5.0)];
        let two_days = vec![snapshot("BTC", "d0", 100.0)];

        let gainers = rank_gainers(&yesterday, &two_days);
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].symbol, "BTC");
    }

    #[test]
    fn test_rank_gainers_top_three_descending() {
        let symbols = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
        let yesterday: Vec<_> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| snapshot(s, "d1", 100.0 + (i as f64 + 1.0)))
            .collect();
        let two_days: Vec<_> = symbols.iter().map(|s| snapshot(s, "d0", 100.0)).collect();

        let gainers = rank_gainers(&yesterday, &two_days);
        assert_eq!(gainers.len(), 3);
        let symbols: Vec<&str> = gainers.iter().map(|g| g.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["J", "I", "H"]);
        assert!(gainers[0].percent_change > gainers[1].percent_change);
        assert!(gainers[1].percent_change > gainers[2].percent_change);
    }

    #[test]
    fn test_rank_gainers_skips_zero_base_price() {
        let yesterday = vec![snapshot("ZRO", "d1", 1.0)];
        let two_days = vec![snapshot("ZRO", "d0", 0.0)];
        assert!(rank_gainers(&yesterday, &two_days).is_empty());
    }

    #[test]
    fn test_rank_gainers_empty_inputs() {
        assert!(rank_gainers(&[], &[]).is_empty());
    }

    #[test]
    fn test_token_sentence_stable_at_boundary() {
        let sentence = token_sentence("BTC", 102.0, 100.0);
        assert!(sentence.contains("remains stable"), "{sentence}");
        assert!(sentence.contains("$BTC"));
    }

    #[test]
    fn test_token_sentence_bullish() {
        let sentence = token_sentence("BTC", 110.0, 100.0);
        assert!(sentence.contains("bullish momentum"), "{sentence}");
        assert!(sentence.contains("(+10.00%)"));
        assert!(sentence.contains("$110"));
    }

    #[test]
    fn test_token_sentence_bearish_uses_absolute_value() {
        let sentence = token_sentence("ETH", 90.0, 100.0);
        assert!(sentence.contains("facing some pressure"), "{sentence}");
        assert!(sentence.contains("(-10.00%)"));
    }

    #[test]
    fn test_format_thousands_grouping() {
        assert_eq!(format_thousands(1_234_567.891), "1,234,567.89");
        assert_eq!(format_thousands(999.0), "999.00");
        assert_eq!(format_thousands(0.0), "0.00");
        assert_eq!(format_thousands(1_000.0), "1,000.00");
    }

    #[tokio::test]
    async fn test_is_trendy_states() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let engine = MetricsEngine::new(db.clone());

        assert!(!engine.is_trendy("RLC", "2025-03-01").await);

        db.upsert_trending(&TrendingSnapshot {
            id: 1637,
            slug: "rlc".to_string(),
            day: "2025-03-01".to_string(),
            symbol: "RLC".to_string(),
            name: "iExec RLC".to_string(),
        })
        .await
        .unwrap();
        assert!(engine.is_trendy("RLC", "2025-03-01").await);

        db.upsert_trending(&TrendingSnapshot {
            id: 0,
            slug: "ghost".to_string(),
            day: "2025-03-01".to_string(),
            symbol: "GHO".to_string(),
            name: String::new(),
        })
        .await
        .unwrap();
        assert!(!engine.is_trendy("GHO", "2025-03-01").await);
    }

    #[tokio::test]
    async fn test_top_gainers_from_store() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let engine = MetricsEngine::new(db.clone());

        let yesterday = dates::yesterday();
        let two_days = dates::days_ago(2);
        db.upsert_historical(&snapshot("BTC", &yesterday, 110.0))
            .await
            .unwrap();
        db.upsert_historical(&snapshot("ETH", &yesterday, 90.0))
            .await
            .unwrap();
        db.upsert_historical(&snapshot("BTC", &two_days, 100.0))
            .await
            .unwrap();
        db.upsert_historical(&snapshot("ETH", &two_days, 100.0))
            .await
            .unwrap();

        let gainers = engine.top_gainers().await.unwrap();
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].symbol, "BTC");
        assert_eq!(gainers[0].percent_change, 10.0);
    }
}
