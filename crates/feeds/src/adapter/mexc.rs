use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_to_rfc3339};
use crate::FeedError;

/// MEXC contract adapter.
pub struct MexcAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MexcResponse {
    success: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<MexcFundingRate>,
}

#[derive(Debug, Deserialize)]
struct MexcFundingRate {
    symbol: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: Option<f64>,
    #[serde(rename = "nextSettleTime", default)]
    next_settle_time: Option<i64>,
}

impl MexcAdapter {
    pub const NAME: &'static str = "MEXC";
    const URL: &'static str = "https://contract.mexc.com/api/v1/contract/funding_rate";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `contract/funding_rate` response.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: MexcResponse = serde_json::from_str(json)?;

        if !response.success {
            return Err(FeedError::UnexpectedData(format!(
                "code {}: {}",
                response.code,
                response.message.unwrap_or_default()
            )));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let rate = entry.funding_rate.filter(|r| r.is_finite())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &entry.symbol,
                    rate,
                    &ms_to_rfc3339(entry.next_settle_time.unwrap_or(0)),
                ))
            })
            .collect())
    }
}

impl Default for MexcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for MexcAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
