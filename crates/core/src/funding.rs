//! Funding rate records as reported by exchanges.

use crate::PayDirection;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder stored in [`FundingRate::next_funding`] when a venue does not
/// report the next settlement time.
pub const UNKNOWN_FUNDING_TIME: &str = "unknown";

/// Latest funding rates per exchange, keyed by exchange name.
///
/// A `BTreeMap` so that reports iterate exchanges in lexicographic order.
pub type RatesSnapshot = BTreeMap<String, Vec<FundingRate>>;

/// Funding rate of one perpetual contract on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRate {
    /// Exchange name (e.g., "Binance", "HTX")
    pub exchange: CompactString,
    /// Contract symbol as the venue names it (e.g., "BTCUSDT", "BTC-USDT")
    pub symbol: CompactString,
    /// Signed rate as a fraction (0.0001 = 0.01%)
    pub rate: f64,
    /// Next settlement time, RFC 3339 or [`UNKNOWN_FUNDING_TIME`]
    pub next_funding: CompactString,
}

impl FundingRate {
    pub fn new(exchange: &str, symbol: &str, rate: f64, next_funding: &str) -> Self {
        Self {
            exchange: CompactString::new(exchange),
            symbol: CompactString::new(symbol),
            rate,
            next_funding: CompactString::new(next_funding),
        }
    }

    /// Create a rate whose next settlement time is not known.
    pub fn without_schedule(exchange: &str, symbol: &str, rate: f64) -> Self {
        Self::new(exchange, symbol, rate, UNKNOWN_FUNDING_TIME)
    }

    #[inline]
    pub fn abs_rate(&self) -> f64 {
        self.rate.abs()
    }

    /// Rate expressed in percent.
    #[inline]
    pub fn rate_pct(&self) -> f64 {
        self.rate * 100.0
    }

    /// Which side pays at the next settlement.
    #[inline]
    pub fn direction(&self) -> PayDirection {
        PayDirection::from_rate(self.rate)
    }

    /// True when `|rate| >= threshold`.
    #[inline]
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.abs_rate() >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_funding_rate_new() {
        let rate = FundingRate::new("Binance", "BTCUSDT", 0.0001, "2024-01-01T08:00:00Z");
        assert_eq!(rate.exchange, "Binance");
        assert_eq!(rate.symbol, "BTCUSDT");
        assert_eq!(rate.next_funding, "2024-01-01T08:00:00Z");
        assert!((rate.rate_pct() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_without_schedule() {
        let rate = FundingRate::without_schedule("HTX", "BTC-USDT", -0.002);
        assert_eq!(rate.next_funding, UNKNOWN_FUNDING_TIME);
    }

    #[test]
    fn test_exceeds_uses_absolute_value() {
        let negative = FundingRate::without_schedule("Bybit", "ETHUSDT", -0.02);
        assert!(negative.exceeds(0.001));
        assert!(negative.exceeds(0.02));
        assert!(!negative.exceeds(0.021));

        let small = FundingRate::without_schedule("Bybit", "SOLUSDT", 0.0005);
        assert!(!small.exceeds(0.001));
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let rate = FundingRate::new("Bybit", "ETHUSDT", 0.0003, "2024-01-01T08:00:00Z");
        let json = serde_json::to_string(&rate).unwrap();
        assert!(json.contains("\"nextFunding\""));

        let parsed: FundingRate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rate);
    }
}
