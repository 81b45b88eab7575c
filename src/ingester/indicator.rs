//! Market-indicator fetcher
//!
//! Fear-greed index and global dominance are fetched independently and only
//! committed to the cache when both calls succeed with sane values. The
//! cache TTL outlives the fetch interval, so a transient failure keeps the
//! previous value servable until it expires. Nothing here is persisted.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{AnalyticsError, Result};
use crate::events::{Event, EventBus};
use crate::storage::cache::IndicatorCache;
use crate::types::MarketIndicator;

use super::{get_json, http_client};

pub struct IndicatorFetcher {
    http: reqwest::Client,
    base_url: String,
    cache: IndicatorCache,
    bus: Arc<EventBus>,
}

impl IndicatorFetcher {
    pub fn new(api: &ApiConfig, bus: Arc<EventBus>) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(api.http_timeout_secs))?,
            base_url: api.indicator_url.clone(),
            cache: IndicatorCache::default(),
            bus,
        })
    }

    /// Fetch both indicator endpoints and commit to cache only when both
    /// return sane values. Publishes `MarketIndicator` on a successful
    /// update; failures are logged and leave the cache untouched.
    pub async fn fetch_and_cache(&self) {
        let (fear_greed, global) = tokio::join!(self.fetch_fear_greed(), self.fetch_global());

        match (fear_greed, global) {
            (Ok(fear_greed), Ok(global))
                if fear_greed.today > 0 && global.btc_dominance > 0.0 =>
            {
                tracing::info!("put market indicator in cache");
                self.cache.store(MarketIndicator {
                    fear_greed_today: fear_greed.today,
                    fear_greed_yesterday: fear_greed.yesterday,
                    btc_dominance: global.btc_dominance,
                    total_market_cap: global.total_market_cap,
                });
                self.bus.notify(Event::MarketIndicator).await;
            }
            (fear_greed, global) => {
                if let Err(e) = fear_greed {
                    tracing::error!("fear-greed fetch failed: {e}");
                }
                if let Err(e) = global {
                    tracing::error!("global indicator fetch failed: {e}");
                }
                tracing::warn!("market indicator cache not updated");
            }
        }
    }

    /// Last committed indicator, or `NotAvailable` when the cache is empty
    /// or expired. Never blocks waiting for a fetch.
    pub fn market_indicator(&self) -> Result<MarketIndicator> {
        self.cache
            .get()
            .ok_or(AnalyticsError::NotAvailable("market indicator"))
    }

    async fn fetch_fear_greed(&self) -> Result<FearGreedResponse> {
        tracing::info!("start fetching fear and greed index");
        let url = format!("{}/v0/widgets/fear-and-greed-index", self.base_url);
        get_json(&self.http, &url).await
    }

    async fn fetch_global(&self) -> Result<GlobalResponse> {
        tracing::info!("start fetching global indicator");
        let url = format!("{}/v0/global", self.base_url);
        get_json(&self.http, &url).await
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct FearGreedResponse {
    #[serde(default)]
    today: i64,
    #[serde(default)]
    yesterday: i64,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalResponse {
    #[serde(default)]
    btc_dominance: f64,
    #[serde(default)]
    total_market_cap: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fear_greed_response_decodes() {
        let body = r#"{"today": 61, "yesterday": 54, "lastWeek": 70, "lastMonth": 44}"#;
        let response: FearGreedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.today, 61);
        assert_eq!(response.yesterday, 54);
    }

    #[test]
    fn test_global_response_decodes() {
        let body = r#"{
            "btcDominance": 58.7,
            "btcDominanceChangePercent": -0.2,
            "totalMarketCap": 2400000000000.0
        }"#;
        let response: GlobalResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.btc_dominance, 58.7);
        assert_eq!(response.total_market_cap, 2.4e12);
    }

    #[tokio::test]
    async fn test_indicator_unavailable_before_any_fetch() {
        let fetcher = IndicatorFetcher::new(
            &crate::config::ApiConfig::default(),
            Arc::new(EventBus::new()),
        )
        .unwrap();
        assert!(matches!(
            fetcher.market_indicator(),
            Err(AnalyticsError::NotAvailable(_))
        ));
    }

    #[test]
    fn test_missing_fields_default_to_insane_values() {
        // A malformed-but-valid-JSON body decodes to zeros, which the
        // sanity gate then rejects.
        let response: FearGreedResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.today, 0);
        let global: GlobalResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(global.btc_dominance, 0.0);
    }
}
