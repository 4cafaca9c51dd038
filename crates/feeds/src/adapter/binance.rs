use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_to_rfc3339, parse_rate};
use crate::FeedError;

/// Binance USDⓈ-M futures adapter.
pub struct BinanceAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BinancePremiumIndex {
    symbol: String,
    #[serde(rename = "lastFundingRate", default)]
    last_funding_rate: Option<String>,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: i64,
}

impl BinanceAdapter {
    pub const NAME: &'static str = "Binance";
    const URL: &'static str = "https://fapi.binance.com/fapi/v1/premiumIndex";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `premiumIndex` response (an array covering every symbol).
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let entries: Vec<BinancePremiumIndex> = serde_json::from_str(json)?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                // Delivery contracts report an empty rate
                let rate = parse_rate(entry.last_funding_rate.as_deref())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &entry.symbol,
                    rate,
                    &ms_to_rfc3339(entry.next_funding_time),
                ))
            })
            .collect())
    }
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for BinanceAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funding_core::UNKNOWN_FUNDING_TIME;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binance_parse_premium_index() {
        let json = r#"[
            {
                "symbol": "BTCUSDT",
                "markPrice": "50000.00",
                "indexPrice": "49990.00",
                "lastFundingRate": "0.00010000",
                "nextFundingTime": 1700000000000,
                "interestRate": "0.00010000",
                "time": 1699999000000
            },
            {
                "symbol": "ETHUSDT",
                "lastFundingRate": "-0.00250000",
                "nextFundingTime": 0
            },
            {
                "symbol": "BTCUSDT_240329",
                "lastFundingRate": "",
                "nextFundingTime": 0
            }
        ]"#;

        let rates = BinanceAdapter::parse_funding_rates(json).unwrap();
        assert_eq!(rates.len(), 2);

        assert_eq!(rates[0].exchange, "Binance");
        assert_eq!(rates[0].symbol, "BTCUSDT");
        assert!((rates[0].rate - 0.0001).abs() < 1e-12);
        assert_eq!(rates[0].next_funding, "2023-11-14T22:13:20Z");

        assert_eq!(rates[1].symbol, "ETHUSDT");
        assert!((rates[1].rate + 0.0025).abs() < 1e-12);
        assert_eq!(rates[1].next_funding, UNKNOWN_FUNDING_TIME);
    }

    #[test]
    fn test_binance_parse_rejects_error_payload() {
        let json = r#"{"code": -1003, "msg": "Too many requests"}"#;
        assert!(BinanceAdapter::parse_funding_rates(json).is_err());
    }
}
