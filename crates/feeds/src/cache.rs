//! Latest funding rates per exchange.

use crate::{FeedError, FundingSource};
use dashmap::DashMap;
use funding_core::{FundingRate, RatesSnapshot};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// In-memory view of the most recently fetched rates, keyed by exchange name.
///
/// Each exchange entry is replaced whole on refresh, so readers never observe
/// a half-updated exchange.
#[derive(Default)]
pub struct RatesCache {
    rates: DashMap<String, Vec<FundingRate>>,
    sink: Option<mpsc::Sender<FundingRate>>,
}

impl RatesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Republish every fetched rate to `sink`.
    pub fn with_sink(mut self, sink: mpsc::Sender<FundingRate>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fetch from `source` and replace its cache entry.
    ///
    /// On failure the previous entry is left untouched.
    pub async fn update_rates(&self, source: &dyn FundingSource) -> Result<usize, FeedError> {
        let rates = source.fetch_funding_rates().await?;
        let count = rates.len();

        self.republish(source.name(), &rates);
        self.insert(source.name(), rates);

        debug!(exchange = source.name(), count = count, "Funding rates updated");
        Ok(count)
    }

    /// Replace the entry for `exchange`.
    pub fn insert(&self, exchange: &str, rates: Vec<FundingRate>) {
        self.rates.insert(exchange.to_string(), rates);
    }

    /// Point-in-time copy of every exchange's rates.
    pub fn all_rates(&self) -> RatesSnapshot {
        self.rates
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn rates_for(&self, exchange: &str) -> Option<Vec<FundingRate>> {
        self.rates.get(exchange).map(|entry| entry.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn exchange_count(&self) -> usize {
        self.rates.len()
    }

    fn republish(&self, exchange: &str, rates: &[FundingRate]) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut dropped = 0usize;
        for rate in rates {
            match sink.try_send(rate.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(exchange = exchange, "Republish queue closed");
                    return;
                }
            }
        }

        if dropped > 0 {
            warn!(
                exchange = exchange,
                dropped = dropped,
                "Republish queue full, rates dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StaticSource {
        name: &'static str,
        rates: Vec<FundingRate>,
    }

    #[async_trait]
    impl FundingSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
            Ok(self.rates.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FundingSource for FailingSource {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
            Err(FeedError::Http("connection refused".to_string()))
        }
    }

    fn source(name: &'static str, symbols: &[&str]) -> StaticSource {
        StaticSource {
            name,
            rates: symbols
                .iter()
                .map(|s| FundingRate::without_schedule(name, s, 0.001))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_update_and_snapshot() {
        let cache = RatesCache::new();
        assert!(cache.is_empty());

        let count = cache
            .update_rates(&source("Bybit", &["BTCUSDT", "ETHUSDT"]))
            .await
            .unwrap();
        assert_eq!(count, 2);
        cache.update_rates(&source("Binance", &["BTCUSDT"])).await.unwrap();

        let snapshot = cache.all_rates();
        let names: Vec<&String> = snapshot.keys().collect();
        assert_eq!(names, vec!["Binance", "Bybit"]);
        assert_eq!(snapshot["Bybit"].len(), 2);
    }

    #[tokio::test]
    async fn test_update_replaces_entry() {
        let cache = RatesCache::new();
        cache.update_rates(&source("Bybit", &["A", "B", "C"])).await.unwrap();
        cache.update_rates(&source("Bybit", &["D"])).await.unwrap();

        let rates = cache.rates_for("Bybit").unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].symbol, "D");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_stale_entry() {
        let cache = RatesCache::new();
        cache.insert("Broken", vec![FundingRate::without_schedule("Broken", "X", 0.01)]);

        let result = cache.update_rates(&FailingSource).await;
        assert!(result.is_err());
        assert_eq!(cache.rates_for("Broken").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_republishes_to_sink() {
        let (tx, mut rx) = mpsc::channel(16);
        let cache = RatesCache::new().with_sink(tx);

        cache.update_rates(&source("HTX", &["BTC-USDT", "ETH-USDT"])).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.symbol, "BTC-USDT");
        assert_eq!(second.symbol, "ETH-USDT");
    }

    #[tokio::test]
    async fn test_full_sink_does_not_block_update() {
        let (tx, _rx) = mpsc::channel(1);
        let cache = RatesCache::new().with_sink(tx);

        let count = cache
            .update_rates(&source("Bybit", &["A", "B", "C"]))
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(cache.rates_for("Bybit").unwrap().len(), 3);
    }
}
