//! Market-listing fetcher
//!
//! Polls the trending listing and the paginated historical listings, maps
//! them into daily snapshots and upserts them. Historical days are fetched
//! in five fixed pages of 200 (top 1000 ranked assets) with a fixed delay
//! between calls to respect the API's rate limits.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::ApiConfig;
use crate::dates;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::storage::Database;
use crate::types::{HistoricalSnapshot, TrendingSnapshot};

use super::{get_json, http_client};

const PAGE_OFFSETS: [u32; 5] = [1, 201, 401, 601, 801];
const PAGE_LIMIT: u32 = 200;
const CONVERT_IDS: &str = "2781,1";

/// Backfill never reaches before this day (the 2024 halving).
const BACKFILL_START: &str = "2024-04-19";

/// Tag keywords retained by the listing tag filter.
const TAG_KEYWORDS: [&str; 4] = ["ai-", "-ai", "depin", "distributed-computing"];

pub struct MarketFetcher {
    http: reqwest::Client,
    base_url: String,
    page_delay: Duration,
    db: Arc<Database>,
    bus: Arc<EventBus>,
}

impl MarketFetcher {
    pub fn new(api: &ApiConfig, db: Arc<Database>, bus: Arc<EventBus>) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(api.http_timeout_secs))?,
            base_url: api.market_url.clone(),
            page_delay: Duration::from_secs(api.page_delay_secs),
            db,
            bus,
        })
    }

    /// Fetch the top-50-by-24h-trend listing and upsert one snapshot per
    /// entry, keyed to today. Publishes `Trending` when the cycle
    /// completes; rows upserted before a mid-cycle failure stay in place.
    pub async fn fetch_trending(&self) -> Result<()> {
        tracing::info!("start fetching trending listing");

        let url = format!(
            "{}/data-api/v3/cryptocurrency/listing?start=1&limit=50&sortBy=trending_24h&sortType=desc&cryptoType=all&tagType=all&audited=false",
            self.base_url
        );
        let response: TrendingResponse = get_json(&self.http, &url).await?;

        let today = dates::today();
        for entry in response.data.crypto_currency_list {
            let snapshot = TrendingSnapshot {
                id: entry.id,
                slug: entry.slug,
                day: today.clone(),
                symbol: entry.symbol,
                name: entry.name,
            };
            self.db.upsert_trending(&snapshot).await?;
        }

        self.bus.notify(Event::Trending).await;
        tracing::info!("end fetching trending listing");
        Ok(())
    }

    /// Fetch one page of the ranked listing for `day` and upsert each row.
    /// Pages are independent; an empty page is not an error.
    pub async fn fetch_historical_page(&self, day: &str, start: u32, limit: u32) -> Result<usize> {
        let url = format!(
            "{}/data-api/v3/cryptocurrency/listings/historical?convertId={}&date={}&limit={}&start={}",
            self.base_url, CONVERT_IDS, day, limit, start
        );
        let response: HistoricalResponse = get_json(&self.http, &url).await?;

        let mut saved = 0;
        for entry in response.data {
            let Some(quote) = entry.quotes.first() else {
                continue;
            };
            let snapshot = HistoricalSnapshot {
                id: entry.id,
                slug: entry.slug,
                day: day.to_string(),
                symbol: entry.symbol,
                name: entry.name,
                price: quote.price,
                rank: entry.cmc_rank,
                market_cap: quote.market_cap,
                tags: relevant_tags(&entry.tags),
            };
            self.db.upsert_historical(&snapshot).await?;
            saved += 1;
        }

        Ok(saved)
    }

    /// Fetch all fixed pages for one day; a failing page is logged and the
    /// remaining offsets still run.
    pub async fn fetch_historical_day(&self, day: &str) {
        for start in PAGE_OFFSETS {
            if let Err(e) = self.fetch_historical_page(day, start, PAGE_LIMIT).await {
                tracing::warn!(day, start, "historical page failed: {e}");
            }
            tokio::time::sleep(self.page_delay).await;
        }
    }

    /// Scheduled entry point: refresh yesterday's ranking, then publish
    /// `Ranking`.
    pub async fn fetch_yesterday(&self) {
        tracing::info!("start fetching historical listing");
        self.fetch_historical_day(&dates::yesterday()).await;
        self.bus.notify(Event::Ranking).await;
        tracing::info!("end fetching historical listing");
    }

    /// One-shot bootstrap: walk every day from the fixed start date to now.
    /// Skips entirely unless the historical store is empty.
    pub async fn backfill_since_start(&self) -> Result<()> {
        if self.db.count_historical().await? > 0 {
            tracing::debug!("historical store already populated, skipping backfill");
            return Ok(());
        }

        let from = NaiveDate::parse_from_str(BACKFILL_START, dates::DAY_FORMAT)
            .expect("backfill start date is valid");

        tracing::info!(from = BACKFILL_START, "start historical backfill");
        for day in dates::days_since(from) {
            let day = day.format(dates::DAY_FORMAT).to_string();
            tracing::info!(day = %day, "backfilling");
            self.fetch_historical_day(&day).await;
        }
        tracing::info!("end historical backfill");
        Ok(())
    }
}

/// Keep only tags matching the fixed keyword set (case-insensitive
/// substring), semicolon-joined.
pub fn relevant_tags(tags: &[String]) -> String {
    let mut kept = Vec::new();
    for tag in tags {
        let tag = tag.to_lowercase();
        if TAG_KEYWORDS.iter().any(|keyword| tag.contains(keyword)) {
            kept.push(tag);
        }
    }
    kept.join(";")
}

#[derive(Debug, serde::Deserialize)]
struct TrendingResponse {
    data: TrendingData,
}

#[derive(Debug, serde::Deserialize)]
struct TrendingData {
    #[serde(rename = "cryptoCurrencyList", default)]
    crypto_currency_list: Vec<ListingEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    data: Vec<ListingEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingEntry {
    id: i64,
    name: String,
    symbol: String,
    slug: String,
    #[serde(default)]
    cmc_rank: i64,
    #[serde(default)]
    quotes: Vec<ListingQuote>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingQuote {
    price: f64,
    market_cap: f64,
}
