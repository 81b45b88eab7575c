//! Source fetchers
//!
//! Four independent pollers, each driven by its own scheduler job:
//! - market listings (trending + paginated historical snapshots)
//! - community stats (profile followers / watchlist counts)
//! - market indicators (fear-greed + dominance, cache-only)
//! - social posts (per-account scraping, deduplicated by id)
//!
//! Each fetcher maps an external JSON API into persistence records, upserts
//! them, and publishes an event once its cycle completes. Failures are
//! per-cycle: logged, skipped, retried implicitly on the next firing.

pub mod community;
pub mod indicator;
pub mod market;
pub mod social;


use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{AnalyticsError, Result};

/// HTTP client with the fixed per-call timeout every fetcher uses.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Into::into)
}

/// GET a JSON document. Non-200 maps to `Api`, malformed bodies to `Json`.
pub(crate) async fn get_json<T: DeserializeOwned>(http: &reqwest::Client, url: &str) -> Result<T> {
    let response = http.get(url).send().await?;
    decode(response).await
}

pub(crate) async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(AnalyticsError::Api(format!(
            "request failed with status {status}"
        )));
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
