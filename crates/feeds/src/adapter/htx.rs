use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, ms_str_to_rfc3339, parse_rate};
use crate::FeedError;

/// HTX (Huobi) USDT-margined swaps adapter.
pub struct HtxAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HtxResponse {
    status: String,
    #[serde(rename = "err_msg", default)]
    err_msg: Option<String>,
    #[serde(default)]
    data: Vec<HtxFundingRate>,
}

#[derive(Debug, Deserialize)]
struct HtxFundingRate {
    contract_code: String,
    #[serde(default)]
    funding_rate: Option<String>,
    #[serde(default)]
    funding_time: Option<String>,
}

impl HtxAdapter {
    pub const NAME: &'static str = "HTX";
    const URL: &'static str = "https://api.hbdm.com/linear-swap-api/v1/swap_batch_funding_rate";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `swap_batch_funding_rate` response.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let response: HtxResponse = serde_json::from_str(json)?;

        if response.status != "ok" {
            return Err(FeedError::UnexpectedData(format!(
                "status {}: {}",
                response.status,
                response.err_msg.unwrap_or_default()
            )));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let rate = parse_rate(entry.funding_rate.as_deref())?;
                Some(FundingRate::new(
                    Self::NAME,
                    &entry.contract_code,
                    rate,
                    &ms_str_to_rfc3339(entry.funding_time.as_deref()),
                ))
            })
            .collect())
    }
}

impl Default for HtxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for HtxAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
