//! Snapshot persistence
//!
//! Key-addressed upsert store over SQLite for the four record kinds. Every
//! write is an independent single-row upsert; there are no cross-row
//! transactions, and each table is written by exactly one fetcher, which is
//! what makes the read-then-write upserts race-free.

pub mod cache;

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::types::{CommunitySnapshot, HistoricalSnapshot, SocialPost, TrendingSnapshot};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Store for daily snapshots and social posts
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Ephemeral in-memory store; one connection so every query sees the
    /// same database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trending_snapshots (
                id INTEGER NOT NULL,
                slug TEXT NOT NULL,
                day TEXT NOT NULL,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                PRIMARY KEY (slug, day)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS historical_snapshots (
                id INTEGER NOT NULL,
                slug TEXT NOT NULL,
                day TEXT NOT NULL,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                rank INTEGER NOT NULL,
                market_cap REAL NOT NULL,
                tags TEXT NOT NULL,
                PRIMARY KEY (slug, day)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS community_snapshots (
                crypto_id INTEGER NOT NULL,
                day TEXT NOT NULL,
                symbol TEXT NOT NULL,
                followers TEXT NOT NULL,
                watch_count TEXT NOT NULL,
                PRIMARY KEY (crypto_id, day)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS social_posts (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                author TEXT NOT NULL,
                user_id TEXT NOT NULL,
                text TEXT NOT NULL,
                permanent_url TEXT NOT NULL,
                is_reply INTEGER NOT NULL,
                is_retweet INTEGER NOT NULL,
                is_quoted INTEGER NOT NULL,
                is_pin INTEGER NOT NULL,
                likes INTEGER NOT NULL,
                replies INTEGER NOT NULL,
                reposts INTEGER NOT NULL,
                views INTEGER NOT NULL,
                mentions INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- trending ---

    /// Insert or fully overwrite the row for (slug, day).
    pub async fn upsert_trending(&self, snapshot: &TrendingSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trending_snapshots (id, slug, day, symbol, name)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (slug, day) DO UPDATE SET
                id = excluded.id,
                symbol = excluded.symbol,
                name = excluded.name
            "#,
        )
        .bind(snapshot.id)
        .bind(&snapshot.slug)
        .bind(&snapshot.day)
        .bind(&snapshot.symbol)
        .bind(&snapshot.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn trending_at_day(&self, symbol: &str, day: &str) -> Result<Option<TrendingSnapshot>> {
        let row = sqlx::query_as::<_, TrendingRow>(
            r#"
            SELECT id, slug, day, symbol, name
            FROM trending_snapshots
            WHERE symbol = ? AND day = ?
            "#,
        )
        .bind(symbol)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn count_trending(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trending_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- historical ---

    /// Insert or fully overwrite the row for (slug, day); a refetch for the
    /// same day never duplicates.
    pub async fn upsert_historical(&self, snapshot: &HistoricalSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO historical_snapshots
                (id, slug, day, symbol, name, price, rank, market_cap, tags)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (slug, day) DO UPDATE SET
                id = excluded.id,
                symbol = excluded.symbol,
                name = excluded.name,
                price = excluded.price,
                rank = excluded.rank,
                market_cap = excluded.market_cap,
                tags = excluded.tags
            "#,
        )
        .bind(snapshot.id)
        .bind(&snapshot.slug)
        .bind(&snapshot.day)
        .bind(&snapshot.symbol)
        .bind(&snapshot.name)
        .bind(snapshot.price)
        .bind(snapshot.rank)
        .bind(snapshot.market_cap)
        .bind(&snapshot.tags)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn historical_for_symbol_day(
        &self,
        symbol: &str,
        day: &str,
    ) -> Result<Option<HistoricalSnapshot>> {
        let row = sqlx::query_as::<_, HistoricalRow>(
            r#"
            SELECT id, slug, day, symbol, name, price, rank, market_cap, tags
            FROM historical_snapshots
            WHERE symbol = ? AND day = ?
            "#,
        )
        .bind(symbol)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn historical_for_day(&self, day: &str) -> Result<Vec<HistoricalSnapshot>> {
        let rows = sqlx::query_as::<_, HistoricalRow>(
            r#"
            SELECT id, slug, day, symbol, name, price, rank, market_cap, tags
            FROM historical_snapshots
            WHERE day = ?
            ORDER BY rank ASC
            "#,
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_historical(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM historical_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- community ---

    /// Update-then-save: look up by (crypto_id, day), apply field-level
    /// updates if found, insert otherwise. Key columns are never rewritten.
    pub async fn save_community(&self, snapshot: &CommunitySnapshot) -> Result<()> {
        let existing = self
            .community_for_day(snapshot.crypto_id, &snapshot.day)
            .await?;

        match existing {
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE community_snapshots
                    SET followers = ?, watch_count = ?
                    WHERE crypto_id = ? AND day = ?
                    "#,
                )
                .bind(&snapshot.followers)
                .bind(&snapshot.watch_count)
                .bind(snapshot.crypto_id)
                .bind(&snapshot.day)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO community_snapshots (crypto_id, day, symbol, followers, watch_count)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(snapshot.crypto_id)
                .bind(&snapshot.day)
                .bind(&snapshot.symbol)
                .bind(&snapshot.followers)
                .bind(&snapshot.watch_count)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    pub async fn community_for_day(
        &self,
        crypto_id: i64,
        day: &str,
    ) -> Result<Option<CommunitySnapshot>> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT crypto_id, day, symbol, followers, watch_count
            FROM community_snapshots
            WHERE crypto_id = ? AND day = ?
            "#,
        )
        .bind(crypto_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn count_community(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM community_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- social posts ---

    /// Upsert by post id. On update the stored `timestamp` wins over the
    /// fetched one, in case the source rewrites timestamps on edit.
    pub async fn save_social_post(&self, post: &SocialPost) -> Result<()> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT timestamp FROM social_posts WHERE id = ?")
                .bind(&post.id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some((timestamp,)) => {
                sqlx::query(
                    r#"
                    UPDATE social_posts
                    SET conversation_id = ?, author = ?, user_id = ?, text = ?,
                        permanent_url = ?, is_reply = ?, is_retweet = ?,
                        is_quoted = ?, is_pin = ?, likes = ?, replies = ?,
                        reposts = ?, views = ?, mentions = ?, timestamp = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&post.conversation_id)
                .bind(&post.author)
                .bind(&post.user_id)
                .bind(&post.text)
                .bind(&post.permanent_url)
                .bind(post.is_reply)
                .bind(post.is_retweet)
                .bind(post.is_quoted)
                .bind(post.is_pin)
                .bind(post.likes)
                .bind(post.replies)
                .bind(post.reposts)
                .bind(post.views)
                .bind(post.mentions)
                .bind(timestamp)
                .bind(&post.id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO social_posts
                        (id, conversation_id, author, user_id, text, permanent_url,
                         is_reply, is_retweet, is_quoted, is_pin, likes, replies,
                         reposts, views, mentions, timestamp)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&post.id)
                .bind(&post.conversation_id)
                .bind(&post.author)
                .bind(&post.user_id)
                .bind(&post.text)
                .bind(&post.permanent_url)
                .bind(post.is_reply)
                .bind(post.is_retweet)
                .bind(post.is_quoted)
                .bind(post.is_pin)
                .bind(post.likes)
                .bind(post.replies)
                .bind(post.reposts)
                .bind(post.views)
                .bind(post.mentions)
                .bind(post.timestamp)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    pub async fn count_posts(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM social_posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Posts with timestamp in [start, end), ascending.
    pub async fn posts_between(&self, start: i64, end: i64) -> Result<Vec<SocialPost>> {
        let rows = sqlx::query_as::<_, SocialPostRow>(
            r#"
            SELECT id, conversation_id, author, user_id, text, permanent_url,
                   is_reply, is_retweet, is_quoted, is_pin, likes, replies,
                   reposts, views, mentions, timestamp
            FROM social_posts
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrendingRow {
    id: i64,
    slug: String,
    day: String,
    symbol: String,
    name: String,
}

impl From<TrendingRow> for TrendingSnapshot {
    fn from(row: TrendingRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            day: row.day,
            symbol: row.symbol,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoricalRow {
    id: i64,
    slug: String,
    day: String,
    symbol: String,
    name: String,
    price: f64,
    rank: i64,
    market_cap: f64,
    tags: String,
}

impl From<HistoricalRow> for HistoricalSnapshot {
    fn from(row: HistoricalRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            day: row.day,
            symbol: row.symbol,
            name: row.name,
            price: row.price,
            rank: row.rank,
            market_cap: row.market_cap,
            tags: row.tags,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommunityRow {
    crypto_id: i64,
    day: String,
    symbol: String,
    followers: String,
    watch_count: String,
}

impl From<CommunityRow> for CommunitySnapshot {
    fn from(row: CommunityRow) -> Self {
        Self {
            crypto_id: row.crypto_id,
            day: row.day,
            symbol: row.symbol,
            followers: row.followers,
            watch_count: row.watch_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SocialPostRow {
    id: String,
    conversation_id: String,
    author: String,
    user_id: String,
    text: String,
    permanent_url: String,
    is_reply: bool,
    is_retweet: bool,
    is_quoted: bool,
    is_pin: bool,
    likes: i64,
    replies: i64,
    reposts: i64,
    views: i64,
    mentions: i64,
    timestamp: i64,
}

impl From<SocialPostRow> for SocialPost {
    fn from(row: SocialPostRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            author: row.author,
            user_id: row.user_id,
            text: row.text,
            permanent_url: row.permanent_url,
            is_reply: row.is_reply,
            is_retweet: row.is_retweet,
            is_quoted: row.is_quoted,
            is_pin: row.is_pin,
            likes: row.likes,
            replies: row.replies,
            reposts: row.reposts,
            views: row.views,
            mentions: row.mentions,
            timestamp: row.timestamp,
        }
    }
}
