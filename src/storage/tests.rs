//! Tests for storage module

use super::Database;
use crate::types::{CommunitySnapshot, HistoricalSnapshot, SocialPost, TrendingSnapshot};

fn historical(symbol: &str, day: &str, price: f64) -> HistoricalSnapshot {
    HistoricalSnapshot {
        id: 1,
        slug: symbol.to_lowercase(),
        day: day.to_string(),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        price,
        rank: 42,
        market_cap: price * 1_000_000.0,
        tags: String::new(),
    }
}

fn post(id: &str, conversation_id: &str, timestamp: i64) -> SocialPost {
    SocialPost {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        author: "iEx_ec".to_string(),
        user_id: "1".to_string(),
        text: "gm".to_string(),
        permanent_url: format!("https://x.com/iEx_ec/status/{id}"),
        is_reply: false,
        is_retweet: false,
        is_quoted: false,
        is_pin: false,
        likes: 0,
        replies: 0,
        reposts: 0,
        views: 0,
        mentions: 0,
        timestamp,
    }
}

#[tokio::test]
async fn test_historical_upsert_keeps_one_row_per_key() {
    let db = Database::connect_in_memory().await.unwrap();

    db.upsert_historical(&historical("BTC", "2025-03-01", 100.0))
        .await
        .unwrap();
    db.upsert_historical(&historical("BTC", "2025-03-01", 110.0))
        .await
        .unwrap();

    assert_eq!(db.count_historical().await.unwrap(), 1);
    let row = db
        .historical_for_symbol_day("BTC", "2025-03-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.price, 110.0);
}

#[tokio::test]
async fn test_historical_distinct_days_are_distinct_rows() {
    let db = Database::connect_in_memory().await.unwrap();

    db.upsert_historical(&historical("BTC", "2025-03-01", 100.0))
        .await
        .unwrap();
    db.upsert_historical(&historical("BTC", "2025-03-02", 105.0))
        .await
        .unwrap();

    assert_eq!(db.count_historical().await.unwrap(), 2);
    assert_eq!(db.historical_for_day("2025-03-01").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_historical_absent_key_is_none() {
    let db = Database::connect_in_memory().await.unwrap();
    let row = db
        .historical_for_symbol_day("BTC", "2025-03-01")
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_trending_upsert_overwrites_name() {
    let db = Database::connect_in_memory().await.unwrap();

    let mut snapshot = TrendingSnapshot {
        id: 1637,
        slug: "rlc".to_string(),
        day: "2025-03-01".to_string(),
        symbol: "RLC".to_string(),
        name: "iExec RLC".to_string(),
    };
    db.upsert_trending(&snapshot).await.unwrap();
    snapshot.name = "iExec".to_string();
    db.upsert_trending(&snapshot).await.unwrap();

    assert_eq!(db.count_trending().await.unwrap(), 1);
    let row = db
        .trending_at_day("RLC", "2025-03-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.name, "iExec");
}

#[tokio::test]
async fn test_community_insert_then_field_update() {
    let db = Database::connect_in_memory().await.unwrap();

    let first = CommunitySnapshot {
        crypto_id: 1637,
        day: "2025-03-01".to_string(),
        symbol: "RLC".to_string(),
        followers: "0".to_string(),
        watch_count: "120000".to_string(),
    };
    db.save_community(&first).await.unwrap();

    // Second cycle the same day recovers the followers count.
    let second = CommunitySnapshot {
        followers: "95000".to_string(),
        ..first.clone()
    };
    db.save_community(&second).await.unwrap();

    assert_eq!(db.count_community().await.unwrap(), 1);
    let row = db
        .community_for_day(1637, "2025-03-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.followers, "95000");
    assert_eq!(row.watch_count, "120000");
    assert_eq!(row.symbol, "RLC");
}

#[tokio::test]
async fn test_social_post_dedup_by_id() {
    let db = Database::connect_in_memory().await.unwrap();

    db.save_social_post(&post("p1", "c1", 100)).await.unwrap();
    db.save_social_post(&post("p1", "c1", 100)).await.unwrap();

    assert_eq!(db.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_social_post_update_preserves_timestamp() {
    let db = Database::connect_in_memory().await.unwrap();

    db.save_social_post(&post("p1", "c1", 100)).await.unwrap();

    // The source rewrote the timestamp; engagement counts still update.
    let mut edited = post("p1", "c1", 999);
    edited.likes = 12;
    db.save_social_post(&edited).await.unwrap();

    let posts = db.posts_between(0, 1000).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].timestamp, 100);
    assert_eq!(posts[0].likes, 12);
}

#[tokio::test]
async fn test_posts_between_window_is_half_open() {
    let db = Database::connect_in_memory().await.unwrap();

    db.save_social_post(&post("p1", "c1", 99)).await.unwrap();
    db.save_social_post(&post("p2", "c1", 100)).await.unwrap();
    db.save_social_post(&post("p3", "c2", 199)).await.unwrap();
    db.save_social_post(&post("p4", "c2", 200)).await.unwrap();

    let posts = db.posts_between(100, 200).await.unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p3"]);
}

#[tokio::test]
async fn test_posts_between_sorted_ascending() {
    let db = Database::connect_in_memory().await.unwrap();

    db.save_social_post(&post("p2", "c1", 50)).await.unwrap();
    db.save_social_post(&post("p1", "c1", 10)).await.unwrap();
    db.save_social_post(&post("p3", "c1", 30)).await.unwrap();

    let posts = db.posts_between(0, 100).await.unwrap();
    let times: Vec<i64> = posts.iter().map(|p| p.timestamp).collect();
    assert_eq!(times, vec![10, 30, 50]);
}
