//! Community fetcher
//!
//! Best-effort enrichment: for each watched asset, profile followers and
//! watchlist count come from two independent endpoints. Either call failing
//! leaves the corresponding field at `"0"` and the write still proceeds.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::dates;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::storage::Database;
use crate::types::{CommunitySnapshot, WatchedAsset};

use super::{decode, get_json, http_client};

pub struct CommunityFetcher {
    http: reqwest::Client,
    base_url: String,
    assets: Vec<WatchedAsset>,
    db: Arc<Database>,
    bus: Arc<EventBus>,
}

impl CommunityFetcher {
    pub fn new(
        api: &ApiConfig,
        assets: Vec<WatchedAsset>,
        db: Arc<Database>,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(api.http_timeout_secs))?,
            base_url: api.market_url.clone(),
            assets,
            db,
            bus,
        })
    }

    /// One full batch over the watchlist. The very first run (empty store)
    /// targets yesterday so the daily report pipeline has a row to read;
    /// every later run targets today. Publishes one `Ranking` event after
    /// the whole batch.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("start fetching community data");

        let first_run = self.db.count_community().await? == 0;
        let day = if first_run {
            dates::yesterday()
        } else {
            dates::today()
        };

        for asset in &self.assets {
            tracing::info!(symbol = %asset.symbol, "fetching community data");

            let mut snapshot = CommunitySnapshot {
                crypto_id: asset.crypto_id,
                day: day.clone(),
                symbol: asset.symbol.clone(),
                followers: "0".to_string(),
                watch_count: "0".to_string(),
            };

            match self.fetch_profile(&asset.handle).await {
                Ok(profile) => snapshot.followers = profile.data.account.followers,
                Err(e) => tracing::warn!(symbol = %asset.symbol, "profile fetch failed: {e}"),
            }
            match self.fetch_watch_count(asset.crypto_id).await {
                Ok(lite) => snapshot.watch_count = lite.data.watch_count,
                Err(e) => tracing::warn!(symbol = %asset.symbol, "watch count fetch failed: {e}"),
            }

            if let Err(e) = self.db.save_community(&snapshot).await {
                tracing::error!(symbol = %asset.symbol, "community save failed: {e}");
            }
        }

        self.bus.notify(Event::Ranking).await;
        tracing::info!("end fetching community data");
        Ok(())
    }

    async fn fetch_profile(&self, handle: &str) -> Result<ProfileResponse> {
        let url = format!("{}/gravity/v3/gravity/profile/query", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "handle": handle }))
            .send()
            .await?;
        decode(response).await
    }

    async fn fetch_watch_count(&self, crypto_id: i64) -> Result<LiteResponse> {
        let url = format!(
            "{}/data-api/v3/cryptocurrency/detail/lite?id={}",
            self.base_url, crypto_id
        );
        get_json(&self.http, &url).await
    }
}

#[derive(Debug, serde::Deserialize)]
struct ProfileResponse {
    data: ProfileData,
}

#[derive(Debug, serde::Deserialize)]
struct ProfileData {
    #[serde(rename = "gravityAccount")]
    account: GravityAccount,
}

#[derive(Debug, serde::Deserialize)]
struct GravityAccount {
    #[allow(dead_code)]
    #[serde(default)]
    handle: String,
    followers: String,
}

#[derive(Debug, serde::Deserialize)]
struct LiteResponse {
    data: LiteData,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiteData {
    #[allow(dead_code)]
    #[serde(default)]
    id: i64,
    watch_count: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_response_decodes() {
        let body = r#"{
            "data": {"gravityAccount": {"handle": "IExecRLC", "followers": "95432"}}
        }"#;
        let response: ProfileResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.account.followers, "95432");
    }

    #[test]
    fn test_lite_response_decodes() {
        let body = r#"{"data": {"id": 1637, "watchCount": "120345"}}"#;
        let response: LiteResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.watch_count, "120345");
    }
}
