//! Configuration management

use crate::error::{AnalyticsError, Result};
use crate::types::{SocialAccount, WatchedAsset};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Production enables the fetch jobs; in development mode the fetchers
    /// stay idle and only on-demand queries work.
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub social: SocialConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Market listing/detail/profile endpoints
    pub market_url: String,
    /// Fear-greed and global indicator endpoints
    pub indicator_url: String,
    /// Social post API endpoint
    pub social_url: String,
    /// Client-level timeout applied to every outbound call
    pub http_timeout_secs: u64,
    /// Fixed delay between paginated listing calls
    pub page_delay_secs: u64,
}

/// Cron expressions use the scheduler's 6-field format (seconds first).
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone all jobs fire in
    pub timezone: String,
    pub trending_cron: String,
    pub historical_cron: String,
    pub community_cron: String,
    pub indicator_cron: String,
    pub social_cron: String,
    pub report_cron: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    /// API bearer token; the social fetcher refuses to start without it
    pub bearer_token: Option<String>,
    /// Number of recent posts fetched per account and cycle
    pub post_count: u32,
    /// Accounts polled by the post fetcher
    pub accounts: Vec<SocialAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistConfig {
    /// Assets the digest reports on
    pub assets: Vec<WatchedAsset>,
    /// The one symbol whose digest block carries the social highlight link
    pub highlight_symbol: String,
}

impl Config {
    /// Load configuration from file, with `CRYPTO_ANALYTICS_*` environment
    /// overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path.as_ref().to_str().unwrap()).required(false))
            .add_source(config::Environment::with_prefix("CRYPTO_ANALYTICS").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "~/.config/crypto-analytics/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        // All sections have defaults; an absent file means env-only config.
        Self::load("config.toml")
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.schedule
            .timezone
            .parse()
            .map_err(|_| AnalyticsError::Config(format!("unknown timezone {}", self.schedule.timezone)))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            market_url: "https://api.coinmarketcap.com".to_string(),
            indicator_url: "https://api.cryptorank.io".to_string(),
            social_url: "https://api.twitter.com".to_string(),
            http_timeout_secs: 15,
            page_delay_secs: 2,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Paris".to_string(),
            trending_cron: "0 0 */6 * * *".to_string(),
            historical_cron: "0 0 3 * * *".to_string(),
            community_cron: "0 0 * * * *".to_string(),
            indicator_cron: "0 */15 * * * *".to_string(),
            social_cron: "0 */15 * * * *".to_string(),
            report_cron: "0 0 7 * * *".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "crypto-analytics.db".to_string(),
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            post_count: 20,
            accounts: vec![SocialAccount {
                user_id: "1".to_string(),
                name: "iEx_ec".to_string(),
                symbol: "RLC".to_string(),
            }],
        }
    }
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            assets: vec![
                WatchedAsset {
                    crypto_id: 1637,
                    symbol: "RLC".to_string(),
                    handle: "IExecRLC".to_string(),
                    description: "iExec RLC (RLC)".to_string(),
                },
                WatchedAsset {
                    crypto_id: 6841,
                    symbol: "PHA".to_string(),
                    handle: "PhalaNetwork".to_string(),
                    description: "Phala Network (PHA)".to_string(),
                },
                WatchedAsset {
                    crypto_id: 5604,
                    symbol: "SCRT".to_string(),
                    handle: "secretnetwork".to_string(),
                    description: "Secret Network (SCRT)".to_string(),
                },
            ],
            highlight_symbol: "RLC".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_defaults_are_six_field() {
        let schedule = ScheduleConfig::default();
        for cron in [
            &schedule.trending_cron,
            &schedule.historical_cron,
            &schedule.community_cron,
            &schedule.indicator_cron,
            &schedule.social_cron,
            &schedule.report_cron,
        ] {
            assert_eq!(cron.split_whitespace().count(), 6, "cron {cron}");
        }
    }

    #[test]
    fn test_default_timezone_parses() {
        let config = Config {
            production: false,
            api: ApiConfig::default(),
            schedule: ScheduleConfig::default(),
            database: DatabaseConfig::default(),
            social: SocialConfig::default(),
            telegram: None,
            watchlist: WatchlistConfig::default(),
        };
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Paris);
    }

    #[test]
    fn test_unknown_timezone_is_config_error() {
        let mut config = Config {
            production: false,
            api: ApiConfig::default(),
            schedule: ScheduleConfig::default(),
            database: DatabaseConfig::default(),
            social: SocialConfig::default(),
            telegram: None,
            watchlist: WatchlistConfig::default(),
        };
        config.schedule.timezone = "Mars/Olympus".to_string();
        assert!(config.timezone().is_err());
    }

    #[test]
    fn test_watchlist_default_highlight_is_watched() {
        let watchlist = WatchlistConfig::default();
        assert!(watchlist
            .assets
            .iter()
            .any(|a| a.symbol == watchlist.highlight_symbol));
    }
}
