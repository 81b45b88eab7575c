//! Crypto Analytics
//!
//! Scheduled aggregation of market, community and social data for a watched
//! set of cryptocurrencies, with a cached daily digest.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use crypto_analytics::{
    config::Config,
    events::EventBus,
    ingester::{
        community::CommunityFetcher, indicator::IndicatorFetcher, market::MarketFetcher,
        social::SocialFetcher,
    },
    metrics::MetricsEngine,
    notify::Notifier,
    report::ReportService,
    scheduler::Scheduler,
    storage::Database,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crypto-analytics")]
#[command(about = "Scheduled crypto market analytics and daily digest bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fetch jobs and digest dispatch
    Run,
    /// Generate the digest once from stored data and print it
    Report,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Report => print_report(config).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting crypto analytics");

    let db = Arc::new(Database::connect(&config.database.path).await?);
    let bus = Arc::new(EventBus::new());

    let market = Arc::new(MarketFetcher::new(&config.api, db.clone(), bus.clone())?);
    let community = Arc::new(CommunityFetcher::new(
        &config.api,
        config.watchlist.assets.clone(),
        db.clone(),
        bus.clone(),
    )?);
    let indicator = Arc::new(IndicatorFetcher::new(&config.api, bus.clone())?);

    // A missing bearer token disables this fetcher; everything else runs.
    let social = match SocialFetcher::new(&config.api, &config.social, db.clone()) {
        Ok(social) => Some(Arc::new(social)),
        Err(e) => {
            tracing::warn!("social fetcher disabled: {e}");
            None
        }
    };

    let notifier = Arc::new(match &config.telegram {
        Some(telegram) => Notifier::new(telegram.bot_token.clone(), telegram.chat_id.clone()),
        None => Notifier::disabled(),
    });

    let engine = MetricsEngine::new(db.clone());
    let report = Arc::new(ReportService::new(
        engine,
        social.clone(),
        notifier,
        &config.watchlist,
    ));
    bus.register(report.clone()).await;

    // Idempotent bootstrap: only fills an empty historical store.
    market.backfill_since_start().await?;

    if config.production {
        tracing::info!("production mode");
        if let Err(e) = market.fetch_trending().await {
            tracing::error!("trending fetch failed: {e}");
        }
        if let Err(e) = community.run().await {
            tracing::error!("community fetch failed: {e}");
        }
        indicator.fetch_and_cache().await;
        if let Some(social) = &social {
            social.clone().fetch_all().await;
        }
    } else {
        tracing::info!("dev mode, fetchers idle");
    }
    report.generate().await;

    let mut scheduler = Scheduler::new(config.timezone()?).await?;
    if config.production {
        register_jobs(
            &scheduler,
            &config,
            market,
            community,
            indicator,
            social,
            report,
        )
        .await?;
    }
    scheduler.start().await?;

    tracing::info!("crypto-analytics is now running, press ctrl-c to exit");
    tokio::signal::ctrl_c().await?;

    tracing::info!("gracefully shutting down");
    scheduler.shutdown().await?;
    Ok(())
}

async fn register_jobs(
    scheduler: &Scheduler,
    config: &Config,
    market: Arc<MarketFetcher>,
    community: Arc<CommunityFetcher>,
    indicator: Arc<IndicatorFetcher>,
    social: Option<Arc<SocialFetcher>>,
    report: Arc<ReportService>,
) -> anyhow::Result<()> {
    let schedule = &config.schedule;

    {
        let market = market.clone();
        scheduler
            .add_job("fetch trending", &schedule.trending_cron, move || {
                let market = market.clone();
                async move {
                    if let Err(e) = market.fetch_trending().await {
                        tracing::error!("trending fetch failed: {e}");
                    }
                }
            })
            .await?;
    }

    scheduler
        .add_job("fetch historical", &schedule.historical_cron, move || {
            let market = market.clone();
            async move {
                market.fetch_yesterday().await;
            }
        })
        .await?;

    scheduler
        .add_job("fetch community", &schedule.community_cron, move || {
            let community = community.clone();
            async move {
                if let Err(e) = community.run().await {
                    tracing::error!("community fetch failed: {e}");
                }
            }
        })
        .await?;

    scheduler
        .add_job("fetch market indicator", &schedule.indicator_cron, move || {
            let indicator = indicator.clone();
            async move {
                indicator.fetch_and_cache().await;
            }
        })
        .await?;

    if let Some(social) = social {
        scheduler
            .add_job("fetch social accounts", &schedule.social_cron, move || {
                let social = social.clone();
                async move {
                    social.fetch_all().await;
                }
            })
            .await?;
    }

    scheduler
        .add_job("send daily report", &schedule.report_cron, move || {
            let report = report.clone();
            async move {
                report.dispatch_digest().await;
            }
        })
        .await?;

    Ok(())
}

async fn print_report(config: Config) -> anyhow::Result<()> {
    let db = Arc::new(Database::connect(&config.database.path).await?);
    let engine = MetricsEngine::new(db);
    let report = ReportService::new(
        engine,
        None,
        Arc::new(Notifier::disabled()),
        &config.watchlist,
    );

    report.generate().await;
    match report.cached_report() {
        Some(digest) => println!("{digest}"),
        None => println!("No report yet, the snapshot store is empty."),
    }

    Ok(())
}
