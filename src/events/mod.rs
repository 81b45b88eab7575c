//! In-process publish/subscribe
//!
//! Fetchers publish a coarse event after each completed cycle; the report
//! component subscribes and recomputes its cached output. Delivery is
//! synchronous on the publishing task: no replay, no persistence of missed
//! events, no backpressure, and a slow subscriber slows the publisher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// An item forwarded by the feed-watcher variant of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
}

/// Coarse event tags published after fetch cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Trending listing refreshed
    Trending,
    /// Ranked historical or community data refreshed
    Ranking,
    /// Price data refreshed
    Price,
    /// Market indicator cache updated
    MarketIndicator,
    /// A new feed item was observed
    Feed(FeedItem),
}

/// Implemented by components that react to fetch-cycle events.
///
/// Handlers run on the publishing task and must not block significantly.
/// No ordering among subscribers is guaranteed.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Subscriber name for logging
    fn name(&self) -> &str;

    async fn on_notify(&self, event: &Event);
}

/// Registry of subscribers; `notify` fans an event out to all of them.
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber. Only subscribers registered at the moment of
    /// a `notify` call see that event.
    pub async fn register(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.write().await.push(subscriber);
    }

    /// Invoke every registered subscriber with the event.
    pub async fn notify(&self, event: Event) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.iter() {
            tracing::debug!(subscriber = subscriber.name(), ?event, "notify");
            subscriber.on_notify(&event).await;
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seen: AtomicUsize,
        trending: AtomicUsize,
    }

    #[async_trait]
    impl Subscriber for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        async fn on_notify(&self, event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if matches!(event, Event::Trending) {
                self.trending.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter {
            seen: AtomicUsize::new(0),
            trending: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.notify(Event::Ranking).await;
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let bus = EventBus::new();
        let first = counter();
        let second = counter();
        bus.register(first.clone()).await;
        bus.register(second.clone()).await;

        bus.notify(Event::Trending).await;
        bus.notify(Event::Ranking).await;

        assert_eq!(first.seen.load(Ordering::SeqCst), 2);
        assert_eq!(second.seen.load(Ordering::SeqCst), 2);
        assert_eq!(first.trending.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        let early = counter();
        bus.register(early.clone()).await;
        bus.notify(Event::Price).await;

        let late = counter();
        bus.register(late.clone()).await;
        bus.notify(Event::Price).await;

        assert_eq!(early.seen.load(Ordering::SeqCst), 2);
        assert_eq!(late.seen.load(Ordering::SeqCst), 1);
    }

    struct FeedSink {
        links: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Subscriber for FeedSink {
        fn name(&self) -> &str {
            "feed-sink"
        }

        async fn on_notify(&self, event: &Event) {
            if let Event::Feed(item) = event {
                self.links.lock().push(item.link.clone());
            }
        }
    }

    #[tokio::test]
    async fn test_feed_event_carries_item() {
        let bus = EventBus::new();
        let sink = Arc::new(FeedSink {
            links: parking_lot::Mutex::new(Vec::new()),
        });
        bus.register(sink.clone()).await;

        bus.notify(Event::Feed(FeedItem {
            title: "release".to_string(),
            link: "https://example.org/release".to_string(),
            published: None,
        }))
        .await;

        assert_eq!(sink.links.lock().as_slice(), ["https://example.org/release"]);
    }
}
