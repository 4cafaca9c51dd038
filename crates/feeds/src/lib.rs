//! Funding rate collection from exchanges.
//!
//! This crate provides REST adapters for each venue, an in-memory cache of
//! the latest rates, and the scheduler that keeps that cache fresh.
//!
//! ## Architecture
//!
//! - `adapter/` - Exchange-specific response parsing behind [`FundingSource`]
//! - `cache` - [`RatesCache`], latest rates per exchange with an optional republish sink
//! - `updater` - [`RateUpdater`], bounded concurrent refresh cycles

pub mod adapter;
pub mod cache;
pub mod error;
pub mod rest;
pub mod updater;

pub use adapter::{
    default_sources, BinanceAdapter, BingXAdapter, BybitAdapter, FundingSource, GateAdapter,
    HtxAdapter, HyperliquidAdapter, KuCoinAdapter, MexcAdapter, OkxAdapter,
};
pub use cache::RatesCache;
pub use error::*;
pub use updater::{CycleSummary, RateUpdater, DEFAULT_MAX_CONCURRENCY, DEFAULT_UPDATE_INTERVAL};
