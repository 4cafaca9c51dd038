//! Periodic refresh of the rates cache.

use crate::{FundingSource, RatesCache};
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default pause between refresh cycles.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(120);

/// Default cap on refreshes running at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Refreshes the cache from every source on a fixed interval.
pub struct RateUpdater {
    sources: Vec<Arc<dyn FundingSource>>,
    cache: Arc<RatesCache>,
    interval: Duration,
    max_concurrency: usize,
}

impl RateUpdater {
    pub fn new(sources: Vec<Arc<dyn FundingSource>>, cache: Arc<RatesCache>) -> Self {
        Self {
            sources,
            cache,
            interval: DEFAULT_UPDATE_INTERVAL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Refresh every source concurrently and wait for all of them.
    ///
    /// A failing source is logged and does not affect the others.
    pub async fn run_cycle(&self) -> CycleSummary {
        let updated = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        stream::iter(self.sources.iter())
            .for_each_concurrent(self.max_concurrency, |source| {
                let cache = &self.cache;
                let updated = &updated;
                let failed = &failed;
                async move {
                    match cache.update_rates(source.as_ref()).await {
                        Ok(_) => {
                            updated.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                exchange = source.name(),
                                error = %e,
                                transient = e.is_transient(),
                                "Failed to update funding rates"
                            );
                        }
                    }
                }
            })
            .await;

        CycleSummary {
            updated: updated.into_inner(),
            failed: failed.into_inner(),
        }
    }

    /// Run forever: one cycle immediately, then one per interval.
    ///
    /// The interval is measured from the end of the previous cycle, so at most
    /// one cycle is outstanding.
    pub async fn run(self) {
        info!(
            sources = self.sources.len(),
            interval_secs = self.interval.as_secs(),
            "Starting funding rate updater"
        );

        loop {
            let summary = self.run_cycle().await;
            info!(
                updated = summary.updated,
                failed = summary.failed,
                exchanges = self.cache.exchange_count(),
                "Funding rate cycle complete"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
