use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_to_rfc3339, parse_rate};
use crate::FeedError;

/// BingX perpetual swaps adapter.
pub struct BingXAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BingXResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<BingXPremiumIndex>,
}

#[derive(Debug, Deserialize)]
struct BingXPremiumIndex {
    symbol: String,
    #[serde(rename = "lastFundingRate", default)]
    last_funding_rate: Option<String>,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: Option<i64>,
}

impl BingXAdapter {
    pub const NAME: &'static str = "BingX";
    const URL: &'static str = "https://open-api.bingx.com/openApi/swap/v2/quote/premiumIndex";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `quote/premiumIndex` response.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: BingXResponse = serde_json::from_str(json)?;

        if response.code != 0 {
            return Err(FeedError::UnexpectedData(format!(
                "code {}: {}",
                response.code, response.msg
            )));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let rate = parse_rate(entry.last_funding_rate.as_deref())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &entry.symbol,
                    rate,
                    &ms_to_rfc3339(entry.next_funding_time.unwrap_or(0)),
                ))
            })
            .collect())
    }
}

impl Default for BingXAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for BingXAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
