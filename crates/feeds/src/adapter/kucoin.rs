use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_to_rfc3339};
use crate::FeedError;

/// KuCoin Futures adapter.
pub struct KuCoinAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct KuCoinResponse {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<KuCoinContract>,
}

#[derive(Debug, Deserialize)]
struct KuCoinContract {
    symbol: String,
    #[serde(rename = "fundingFeeRate", default)]
    funding_fee_rate: Option<f64>,
    #[serde(rename = "nextFundingRateDateTime", default)]
    next_funding_rate_date_time: Option<i64>,
}

impl KuCoinAdapter {
    pub const NAME: &'static str = "KuCoin";
    const URL: &'static str = "https://api-futures.kucoin.com/api/v1/contracts/active";
    const OK: &'static str = "200000";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `contracts/active` listing.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: KuCoinResponse = serde_json::from_str(json)?;

        if response.code != Self::OK {
            return Err(FeedError::UnexpectedData(format!(
                "code {}: {}",
                response.code,
                response.msg.unwrap_or_default()
            )));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|contract| {
                let rate = contract.funding_fee_rate.filter(|r| r.is_finite())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &contract.symbol,
                    rate,
                    &ms_to_rfc3339(contract.next_funding_rate_date_time.unwrap_or(0)),
                ))
            })
            .collect())
    }
}

impl Default for KuCoinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for KuCoinAdapter {
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
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kucoin_parse_active_contracts() {
        let json = r#"{
            "code": "200000",
            "data": [
                {
                    "symbol": "XBTUSDTM",
                    "fundingFeeRate": 0.0001,
                    "nextFundingRateTime": 3600000,
                    "nextFundingRateDateTime": 1700000000000
                },
                {
                    "symbol": "XBTMZ24",
                    "fundingFeeRate": null
                },
                {
                    "symbol": "PEPEUSDTM",
                    "fundingFeeRate": -0.0031,
                    "nextFundingRateDateTime": 1700000000000
                }
            ]
        }"#;

        let rates = KuCoinAdapter::parse_funding_rates(json).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].exchange, "KuCoin");
        assert_eq!(rates[0].symbol, "XBTUSDTM");
        assert_eq!(rates[0].next_funding, "2023-11-14T22:13:20Z");
        assert!((rates[1].rate + 0.0031).abs() < 1e-12);
    }

    #[test]
    fn test_kucoin_parse_error_code() {
        let json = r#"{"code": "429000", "msg": "Too Many Requests"}"#;
        let err = KuCoinAdapter::parse_funding_rates(json).unwrap_err();
        assert!(err.to_string().contains("429000"));
    }
}
