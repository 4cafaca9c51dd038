//! Exchange adapters for funding rate REST endpoints.
//!
//! Each exchange has its own response format. Adapters normalize these into
//! [`FundingRate`] records and expose them through [`FundingSource`].

mod binance;
mod bingx;
mod bybit;
mod gate;
mod htx;
mod hyperliquid;
mod kucoin;
mod mexc;
mod okx;

pub use binance::BinanceAdapter;
pub use bingx::BingXAdapter;
pub use bybit::BybitAdapter;
pub use gate::GateAdapter;
pub use htx::HtxAdapter;
pub use hyperliquid::HyperliquidAdapter;
pub use kucoin::KuCoinAdapter;
pub use mexc::MexcAdapter;
pub use okx::OkxAdapter;

use crate::FeedError;
use async_trait::async_trait;
use funding_core::FundingRate;
use std::sync::Arc;

/// A named venue that can report its current funding rates.
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Exchange name used as the cache key and in reports.
    fn name(&self) -> &str;

    /// Fetch the current funding rate of every perpetual listed on the venue.
    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError>;
}

/// Every adapter this crate ships, in report order.
pub fn default_sources() -> Vec<Arc<dyn FundingSource>> {
    vec![
        Arc::new(BinanceAdapter::new()),
        Arc::new(BybitAdapter::new()),
        Arc::new(HtxAdapter::new()),
        Arc::new(OkxAdapter::new()),
        Arc::new(GateAdapter::new()),
        Arc::new(KuCoinAdapter::new()),
        Arc::new(BingXAdapter::new()),
        Arc::new(MexcAdapter::new()),
        Arc::new(HyperliquidAdapter::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_have_unique_names() {
        let sources = default_sources();
        let mut names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(
            names,
            vec![
                "Binance",
                "BingX",
                "Bybit",
                "Gate",
                "HTX",
                "Hyperliquid",
                "KuCoin",
                "MEXC",
                "OKX"
            ]
        );
    }
}
