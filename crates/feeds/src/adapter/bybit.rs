use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_str_to_rfc3339, parse_rate};
use crate::FeedError;

/// Bybit v5 linear perpetuals adapter.
pub struct BybitAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<BybitResult>,
}

#[derive(Debug, Deserialize)]
struct BybitResult {
    #[serde(default)]
    list: Vec<BybitTicker>,
}

#[derive(Debug, Deserialize)]
struct BybitTicker {
    symbol: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: Option<String>,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: Option<String>,
}

impl BybitAdapter {
    pub const NAME: &'static str = "Bybit";
    const URL: &'static str = "https://api.bybit.com/v5/market/tickers?category=linear";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `tickers` response for the `linear` category.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: BybitResponse = serde_json::from_str(json)?;

        if response.ret_code != 0 {
            return Err(FeedError::UnexpectedData(format!(
                "retCode {}: {}",
                response.ret_code, response.ret_msg
            )));
        }

        let list = response.result.map(|r| r.list).unwrap_or_default();

        Ok(list
            .into_iter()
            .filter_map(|ticker| {
                let rate = parse_rate(ticker.funding_rate.as_deref())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &ticker.symbol,
                    rate,
                    &ms_str_to_rfc3339(ticker.next_funding_time.as_deref()),
                ))
            })
            .collect())
    }
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for BybitAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
