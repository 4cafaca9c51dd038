//! Periodic broadcast of funding reports to subscribers.

use crate::delivery::MessageDelivery;
use crate::report::{format_rates, is_placeholder};
use crate::store::SubscriptionStore;
use funding_feeds::RatesCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Default pause between broadcast cycles.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(300);

/// How often the wait between cycles logs the remaining time.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one broadcast cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    /// Subscribers considered this cycle.
    pub recipients: usize,
    /// Subscribers whose whole report went out.
    pub delivered: usize,
    /// Subscribers with nothing above their threshold.
    pub skipped: usize,
    /// Subscribers with at least one failed chunk.
    pub failed: usize,
}

/// Sends each subscriber a report rendered at their own threshold.
pub struct Broadcaster {
    store: Arc<SubscriptionStore>,
    cache: Arc<RatesCache>,
    delivery: MessageDelivery,
    interval: Duration,
}

impl Broadcaster {
    pub fn new(
        store: Arc<SubscriptionStore>,
        cache: Arc<RatesCache>,
        delivery: MessageDelivery,
    ) -> Self {
        Self {
            store,
            cache,
            delivery,
            interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Broadcast once to every current subscriber.
    ///
    /// A subscriber whose report would only be the "nothing above threshold"
    /// placeholder gets no message.
    pub async fn run_cycle(&self) -> BroadcastSummary {
        let subscribers = self.store.subscribers().await;
        if subscribers.is_empty() {
            debug!("No subscribers, skipping broadcast");
            return BroadcastSummary::default();
        }

        let rates = self.cache.all_rates();
        if rates.is_empty() {
            debug!("Rates cache empty, skipping broadcast");
            return BroadcastSummary::default();
        }

        let mut summary = BroadcastSummary {
            recipients: subscribers.len(),
            ..Default::default()
        };

        for chat_id in subscribers {
            let (threshold, _) = self.store.threshold(chat_id).await;
            let report = format_rates(&rates, threshold);

            if is_placeholder(&report) {
                debug!(chat_id = chat_id, threshold = threshold, "Nothing above threshold");
                summary.skipped += 1;
                continue;
            }

            if self.delivery.deliver(chat_id, &report).await.all_sent() {
                summary.delivered += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            recipients = summary.recipients,
            delivered = summary.delivered,
            skipped = summary.skipped,
            failed = summary.failed,
            "Broadcast cycle finished"
        );
        summary
    }

    /// Broadcast now, then once per interval, forever.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Broadcaster started");

        loop {
            self.run_cycle().await;

            let next = Instant::now() + self.interval;
            loop {
                let now = Instant::now();
                if now >= next {
                    break;
                }
                let left = next - now;
                debug!(remaining_secs = left.as_secs(), "Waiting for next broadcast");
                sleep(left.min(PROGRESS_LOG_INTERVAL)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::RecordingSender;
    use funding_core::FundingRate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<SubscriptionStore>,
        cache: Arc<RatesCache>,
        sender: Arc<RecordingSender>,
        broadcaster: Broadcaster,
    }

    fn fixture_with(sender: RecordingSender) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SubscriptionStore::new(dir.path().join("settings.json"), 0.001));
        let cache = Arc::new(RatesCache::new());
        let sender = Arc::new(sender);
        let broadcaster = Broadcaster::new(
            store.clone(),
            cache.clone(),
            MessageDelivery::new(sender.clone()),
        );

        Fixture {
            _dir: dir,
            store,
            cache,
            sender,
            broadcaster,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingSender::default())
    }

    fn fill_cache(cache: &RatesCache) {
        cache.insert(
            "Binance",
            vec![
                FundingRate::without_schedule("Binance", "BinanceA", -0.02),
                FundingRate::without_schedule("Binance", "BinanceB", 0.0005),
            ],
        );
    }

    #[tokio::test]
    async fn test_no_subscribers_is_a_no_op() {
        let f = fixture();
        fill_cache(&f.cache);

        assert_eq!(f.broadcaster.run_cycle().await, BroadcastSummary::default());
        assert!(f.sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cache_is_a_no_op() {
        let f = fixture();
        f.store.subscribe(1).await;

        assert_eq!(f.broadcaster.run_cycle().await, BroadcastSummary::default());
        assert!(f.sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_own_threshold() {
        let f = fixture();
        fill_cache(&f.cache);
        f.store.subscribe(1).await;
        f.store.subscribe(2).await;
        f.store.set_threshold(2, 0.05).await;

        let summary = f.broadcaster.run_cycle().await;

        assert_eq!(
            summary,
            BroadcastSummary {
                recipients: 2,
                delivered: 1,
                skipped: 1,
                failed: 0,
            }
        );
        let text = f.sender.texts_for(1).await.join("\n");
        assert!(text.contains("BinanceA"));
        assert!(!text.contains("BinanceB"));
        assert!(f.sender.texts_for(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_cycle() {
        let f = fixture_with(RecordingSender::failing_on("<pre>"));
        fill_cache(&f.cache);
        f.store.subscribe(1).await;
        f.store.subscribe(2).await;

        let summary = f.broadcaster.run_cycle().await;

        assert_eq!(summary.failed, 2);
        // Header and separator still reach both chats
        assert!(!f.sender.texts_for(1).await.is_empty());
        assert!(!f.sender.texts_for(2).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_broadcasts_immediately_and_every_interval() {
        let f = fixture();
        fill_cache(&f.cache);
        f.store.subscribe(1).await;

        let broadcaster = Arc::new(f.broadcaster.with_interval(Duration::from_secs(300)));
        let task = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.run().await })
        };

        sleep(Duration::from_secs(1)).await;
        let first = f.sender.texts_for(1).await.len();
        assert!(first > 0);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(f.sender.texts_for(1).await.len(), first * 2);

        task.abort();
    }
}
