//! Report cache & dispatch
//!
//! Rebuilds the daily digest whenever ranked or trending data changes and
//! keeps the rendered string in a no-expiry cache, so delivery channels read
//! it without recomputation. A separate trend-alert path notifies at most
//! once per (symbol, day).

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::WatchlistConfig;
use crate::dates;
use crate::events::{Event, Subscriber};
use crate::ingester::social::SocialFetcher;
use crate::metrics::{self, MetricsEngine};
use crate::notify::Notifier;
use crate::storage::cache::{AlertCache, ReportCache};
use crate::types::WatchedAsset;

pub struct ReportService {
    engine: MetricsEngine,
    social: Option<Arc<SocialFetcher>>,
    notifier: Arc<Notifier>,
    assets: Vec<WatchedAsset>,
    highlight_symbol: String,
    report_cache: ReportCache,
    alerts: AlertCache,
}

impl ReportService {
    pub fn new(
        engine: MetricsEngine,
        social: Option<Arc<SocialFetcher>>,
        notifier: Arc<Notifier>,
        watchlist: &WatchlistConfig,
    ) -> Self {
        Self {
            engine,
            social,
            notifier,
            assets: watchlist.assets.clone(),
            highlight_symbol: watchlist.highlight_symbol.clone(),
            report_cache: ReportCache::new(),
            alerts: AlertCache::default(),
        }
    }

    /// The cached digest, or `None` when generation has never succeeded.
    pub fn cached_report(&self) -> Option<String> {
        self.report_cache.get()
    }

    /// Rebuild the digest from derived metrics and overwrite the cache.
    /// The cache is only written when at least one asset block had price
    /// data, so a half-empty store never evicts a good report.
    pub async fn generate(&self) {
        tracing::info!("generate daily report");
        if self.assets.is_empty() {
            return;
        }

        let mut msg = String::from("📢 *Daily Crypto Report* 🚀\n\n");
        msg += &self.overview_block().await;
        msg += "\n👉 *Focus on tokens*\n\n";

        let mut ok = false;
        for asset in &self.assets {
            let (block, block_ok) = self.asset_block(asset).await;
            msg += &block;
            ok |= block_ok;
        }

        msg += "\n📆 Data from *yesterday*. Stay tuned for more updates! 📈\n\n";
        msg += "⚠️ The report is based on yesterday's data, so 7-day data actually means today minus 8 days.\n";

        if ok {
            self.report_cache.store(msg);
        }
    }

    async fn overview_block(&self) -> String {
        let mut block = String::from("📈 *Market Overview this last 2 days*\n");

        for symbol in ["BTC", "ETH"] {
            let yesterday = self
                .engine
                .for_symbol_yesterday(symbol)
                .await
                .ok()
                .flatten();
            let two_days_ago = self
                .engine
                .for_symbol_two_days_ago(symbol)
                .await
                .ok()
                .flatten();
            if let (Some(yesterday), Some(two_days_ago)) = (yesterday, two_days_ago) {
                block += &metrics::token_sentence(symbol, yesterday.price, two_days_ago.price);
                block.push('\n');
            }
        }
        block.push('\n');

        match self.engine.top_gainers().await {
            Ok(gainers) => {
                for gainer in gainers {
                    block += &format!("- {} (+{:.2}%)\n", gainer.symbol, gainer.percent_change);
                }
            }
            Err(e) => tracing::error!("top gainers failed: {e}"),
        }

        block
    }

    async fn asset_block(&self, asset: &WatchedAsset) -> (String, bool) {
        let mut block = format!("🔹 *{}*\n", asset.description);
        let mut ok = false;

        if let Ok(Some(snapshot)) = self.engine.for_symbol_yesterday(&asset.symbol).await {
            block += &format!("💰 Price: `${:.2}`\n", snapshot.price);
            if let Ok(Some(week_ago)) = self.engine.for_symbol_seven_days_ago(&asset.symbol).await
            {
                if let Some(percent) = metrics::percent_change(snapshot.price, week_ago.price) {
                    let arrow = if percent < 0.0 { "📉" } else { "📈" };
                    block += &format!("{arrow} 7 days : `{percent:.2}%`\n");
                }
            }
            block += &format!("📊 Rank: `#{}`\n", snapshot.rank);
            block += &format!(
                "🏛 Market Cap: `${}`\n",
                metrics::format_thousands(snapshot.market_cap)
            );
            ok = true;
        }

        let trendy = self.engine.is_trendy_yesterday(&asset.symbol).await;
        block += &format!(
            "🔥 Trending: *{}*\n\n",
            if trendy { "Yes! 🚀" } else { "No ❄️" }
        );

        if let Ok(Some(community)) = self.engine.community_yesterday(asset.crypto_id).await {
            block += &format!("👥 *Followers:* `{}`\n", community.followers);
            block += &format!("⭐ *Watchlist Count:* `{}`\n", community.watch_count);
        }

        if asset.symbol == self.highlight_symbol {
            if let Some(social) = &self.social {
                match social.yesterday_posts().await {
                    Ok(posts) if !posts.is_empty() => {
                        block += "🔥 *Social Highlights from Yesterday*\n\n";
                        for post in posts {
                            block += &format!("🔗 [Post Link]({})\n", post.permanent_url);
                        }
                    }
                    _ => block += "No social activity yesterday.\n",
                }
            }
        }

        block.push('\n');
        (block, ok)
    }

    /// Alert on each watched asset trending today, at most once per
    /// (symbol, day).
    pub async fn trending_alerts(&self) {
        tracing::info!("check trending alerts");
        let today = dates::today();

        for asset in &self.assets {
            if !self.engine.is_trendy_today(&asset.symbol).await {
                continue;
            }
            if !self.alerts.mark(&asset.symbol, &today) {
                continue;
            }

            let mut msg = String::from("🚨 *Trending Alert!* 🚀🔥\n\n");
            msg += "🔍 A cryptocurrency is gaining traction! Check it out:\n\n";
            msg += &format!("🔹 *{}* is now *TRENDING!* 🚀\n", asset.symbol);
            msg += "\n⚡ Stay ahead of the market!\n";

            tracing::info!(symbol = %asset.symbol, "send trending alert");
            if let Err(e) = self.notifier.send(&msg).await {
                tracing::error!(symbol = %asset.symbol, "trending alert failed: {e}");
            }
        }
    }

    /// Scheduled digest delivery: push the cached report, or log when no
    /// generation has succeeded yet.
    pub async fn dispatch_digest(&self) {
        match self.cached_report() {
            Some(report) => {
                tracing::info!("send daily report");
                if let Err(e) = self.notifier.send(&report).await {
                    tracing::error!("daily report send failed: {e}");
                }
            }
            None => tracing::warn!("no report yet"),
        }
    }
}

#[async_trait]
impl Subscriber for ReportService {
    fn name(&self) -> &str {
        "report"
    }

    async fn on_notify(&self, event: &Event) {
        match event {
            Event::Trending => {
                self.trending_alerts().await;
                self.generate().await;
            }
            Event::Ranking => self.generate().await,
            _ => {}
        }
    }
}
