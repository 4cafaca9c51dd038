use async_trait::async_trait;
use funding_core::FundingRate;
use serde::Deserialize;

use super::FundingSource;
use crate::rest::{get_text, http_client, parse_rate, secs_to_rfc3339};
use crate::FeedError;

/// Gate USDT-settled perpetuals adapter.
pub struct GateAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GateContract {
    name: String,
    #[serde(default)]
    funding_rate: Option<String>,
    /// Seconds since the epoch.
    #[serde(default)]
    funding_next_apply: Option<f64>,
    #[serde(default)]
    in_delisting: bool,
}

impl GateAdapter {
    pub const NAME: &'static str = "Gate";
    const URL: &'static str = "https://api.gateio.ws/api/v4/futures/usdt/contracts";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse the `futures/usdt/contracts` listing. Contracts being delisted
    /// are skipped.
    pub fn parse_funding_rates(json: &str) -> Result<Vec<FundingRate>, FeedError> {
        let contracts: Vec<GateContract> = serde_json::from_str(json)?;

        Ok(contracts
            .into_iter()
            .filter(|contract| !contract.in_delisting)
            .filter_map(|contract| {
                let rate = parse_rate(contract.funding_rate.as_deref())?;
                let next = contract.funding_next_apply.unwrap_or(0.0) as i64;
                Some(FundingRate::new(
                    Self::NAME,
                    &contract.name,
                    rate,
                    &secs_to_rfc3339(next),
                ))
            })
            .collect())
    }
}

impl Default for GateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for GateAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let body = get_text(&self.client, Self::URL).await?;
        Self::parse_funding_rates(&body)
    }
}
