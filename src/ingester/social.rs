//! Social-post fetcher
//!
//! Polls the recent posts of each configured account, one task per account
//! joined before the cycle completes. Retweets are discarded, the rest is
//! upserted by post id with the stored timestamp preserved on update.
//!
//! The query surface reduces "yesterday's posts" to a single representative
//! thread: the newest conversation rooted yesterday.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;

use crate::config::{ApiConfig, SocialConfig};
use crate::dates;
use crate::error::{AnalyticsError, Result};
use crate::storage::Database;
use crate::types::{SocialAccount, SocialPost};

use super::{decode, http_client};

pub struct SocialFetcher {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    accounts: Vec<SocialAccount>,
    post_count: u32,
    db: Arc<Database>,
}

impl SocialFetcher {
    /// Fails fast when the bearer token is missing; the rest of the system
    /// starts without this fetcher.
    pub fn new(api: &ApiConfig, social: &SocialConfig, db: Arc<Database>) -> Result<Self> {
        let bearer_token = social
            .bearer_token
            .clone()
            .ok_or_else(|| AnalyticsError::Config("social bearer token required".into()))?;

        Ok(Self {
            http: http_client(Duration::from_secs(api.http_timeout_secs))?,
            base_url: api.social_url.clone(),
            bearer_token,
            accounts: social.accounts.clone(),
            post_count: social.post_count,
            db,
        })
    }

    /// One fetch cycle: every account concurrently, joined before
    /// returning. Per-account failures are logged and do not abort the
    /// cycle.
    pub async fn fetch_all(self: Arc<Self>) {
        tracing::info!(accounts = self.accounts.len(), "start fetching social accounts");

        let mut handles = Vec::new();
        for account in self.accounts.clone() {
            let fetcher = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                fetcher.check_account(&account).await;
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("social fetch task failed: {e}");
            }
        }

        tracing::info!("end fetching social accounts");
    }

    async fn check_account(&self, account: &SocialAccount) {
        tracing::info!(account = %account.name, "reading posts");

        let posts = match self.fetch_account_posts(account).await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!(account = %account.name, "cannot retrieve posts, ignored: {e}");
                return;
            }
        };

        for post in keep_interesting(posts) {
            if let Err(e) = self.db.save_social_post(&post).await {
                tracing::error!(post = %post.id, "post save failed: {e}");
            }
        }
    }

    async fn fetch_account_posts(&self, account: &SocialAccount) -> Result<Vec<SocialPost>> {
        let url = format!(
            "{}/2/users/{}/tweets?max_results={}&tweet.fields=created_at,conversation_id,public_metrics,referenced_tweets,entities",
            self.base_url, account.user_id, self.post_count
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let response: PostsResponse = decode(response).await?;

        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|post| map_post(post, account))
            .collect())
    }

    /// All persisted posts inside yesterday's window, reduced to the root
    /// of the newest thread started yesterday. Zero posts yields an empty
    /// vec, not an error.
    pub async fn yesterday_posts(&self) -> Result<Vec<SocialPost>> {
        let (start, end) = dates::yesterday_bounds();
        tracing::info!(start, end, "fetching yesterday posts");
        let posts = self.db.posts_between(start, end).await?;
        Ok(latest_root(posts))
    }
}

/// Drop retweets and sort ascending by timestamp.
pub fn keep_interesting(posts: Vec<SocialPost>) -> Vec<SocialPost> {
    let mut kept: Vec<SocialPost> = posts.into_iter().filter(|p| !p.is_retweet).collect();
    kept.sort_by_key(|p| p.timestamp);
    kept
}

/// Reduce to one representative post per thread, then to the single most
/// recently rooted thread: group by conversation id, keep the earliest
/// (root) post of each conversation, return the newest of those roots.
pub fn latest_root(posts: Vec<SocialPost>) -> Vec<SocialPost> {
    let mut roots: HashMap<String, SocialPost> = HashMap::new();
    for post in posts {
        match roots.get(&post.conversation_id) {
            Some(existing) if existing.timestamp <= post.timestamp => {}
            _ => {
                roots.insert(post.conversation_id.clone(), post);
            }
        }
    }

    roots
        .into_values()
        .max_by_key(|post| post.timestamp)
        .map(|post| vec![post])
        .unwrap_or_default()
}

fn map_post(post: ApiPost, account: &SocialAccount) -> SocialPost {
    let references: Vec<&str> = post
        .referenced_tweets
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|r| r.kind.as_str())
        .collect();
    let metrics = post.public_metrics.unwrap_or_default();

    SocialPost {
        permanent_url: format!("https://x.com/{}/status/{}", account.name, post.id),
        conversation_id: post.conversation_id.unwrap_or_else(|| post.id.clone()),
        id: post.id,
        author: account.name.clone(),
        user_id: account.user_id.clone(),
        text: post.text,
        is_reply: references.contains(&"replied_to"),
        is_retweet: references.contains(&"retweeted"),
        is_quoted: references.contains(&"quoted"),
        is_pin: false,
        likes: metrics.like_count,
        replies: metrics.reply_count,
        reposts: metrics.retweet_count,
        views: metrics.impression_count,
        mentions: post
            .entities
            .map(|e| e.mentions.len() as i64)
            .unwrap_or_default(),
        timestamp: post
            .created_at
            .as_deref()
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .map(|at| at.timestamp())
            .unwrap_or_default(),
    }
}

#[derive(Debug, serde::Deserialize)]
struct PostsResponse {
    data: Option<Vec<ApiPost>>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiPost {
    id: String,
    text: String,
    conversation_id: Option<String>,
    created_at: Option<String>,
    public_metrics: Option<PostMetrics>,
    referenced_tweets: Option<Vec<ReferencedPost>>,
    entities: Option<PostEntities>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct PostMetrics {
    #[serde(default)]
    retweet_count: i64,
    #[serde(default)]
    reply_count: i64,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    impression_count: i64,
}

#[derive(Debug, serde::Deserialize)]
struct ReferencedPost {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, serde::Deserialize)]
struct PostEntities {
    #[serde(default)]
    mentions: Vec<PostMention>,
}

#[derive(Debug, serde::Deserialize)]
struct PostMention {
    #[allow(dead_code)]
    #[serde(default)]
    username: String,
}
