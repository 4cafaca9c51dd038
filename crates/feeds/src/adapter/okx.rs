use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_str_to_rfc3339, parse_rate};
use crate::FeedError;

/// OKX perpetual swaps adapter.
pub struct OkxAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<OkxFundingRate>,
}

#[derive(Debug, Deserialize)]
struct OkxFundingRate {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: Option<String>,
    /// Upcoming settlement; `nextFundingTime` is the one after it.
    #[serde(rename = "fundingTime", default)]
    funding_time: Option<String>,
}

impl OkxAdapter {
    pub const NAME: &'static str = "OKX";
    const URL: &'static str = "https://www.okx.com/api/v5/public/funding-rate?instId=ANY";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `public/funding-rate` response.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: OkxResponse = serde_json::from_str(json)?;

        if response.code != "0" {
            return Err(FeedError::UnexpectedData(format!(
                "code {}: {}",
                response.code, response.msg
            )));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let rate = parse_rate(entry.funding_rate.as_deref())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &entry.inst_id,
                    rate,
                    &ms_str_to_rfc3339(entry.funding_time.as_deref()),
                ))
            })
            .collect())
    }
}

impl Default for OkxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for OkxAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
