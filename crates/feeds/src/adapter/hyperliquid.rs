use async_trait::async_trait;
use chrono::{DateTime, Utc};
use funding_core::FundingRate;
use serde::Deserialize;
use serde_json::json;

use super::FundingSource;
use crate::rest::{http_client, parse_rate, post_json_text, secs_to_rfc3339};
use crate::FeedError;

/// Hyperliquid perpetuals adapter.
///
/// The info endpoint returns the universe and the asset contexts as two
/// parallel arrays. Funding settles every hour on the hour.
pub struct HyperliquidAdapter {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HyperliquidMeta {
    universe: Vec<HyperliquidAsset>,
}

#[derive(Debug, Deserialize)]
struct HyperliquidAsset {
    name: String,
    #[serde(rename = "isDelisted", default)]
    is_delisted: bool,
}

#[derive(Debug, Deserialize)]
struct HyperliquidAssetCtx {
    #[serde(default)]
    funding: Option<String>,
}

const FUNDING_PERIOD_SECS: i64 = 3600;

impl HyperliquidAdapter {
    pub const NAME: &'static str = "Hyperliquid";
    const URL: &'static str = "https://api.hyperliquid.xyz/info";

    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Parse a `metaAndAssetCtxs` response, scheduling every contract for the
    /// top of the hour following `now`.
    pub fn parse_funding_rates(
        json: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<FundingRate>, FeedError> {
        let (meta, ctxs): (HyperliquidMeta, Vec<HyperliquidAssetCtx>) =
            serde_json::from_str(json)?;

        if meta.universe.len() != ctxs.len() {
            return Err(FeedError::UnexpectedData(format!(
                "{} assets but {} contexts",
                meta.universe.len(),
                ctxs.len()
            )));
        }

        let next = (now.timestamp().div_euclid(FUNDING_PERIOD_SECS) + 1) * FUNDING_PERIOD_SECS;
        let next_funding = secs_to_rfc3339(next);

        Ok(meta
            .universe
            .into_iter()
            .zip(ctxs)
            .filter(|(asset, _)| !asset.is_delisted)
            .filter_map(|(asset, ctx)| {
                let rate = parse_rate(ctx.funding.as_deref())?;
                Some(FundingRate::new(Self::NAME, &asset.name, rate, &next_funding))
            })
            .collect())
    }
}

impl Default for HyperliquidAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundingSource for HyperliquidAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_funding_rates(&self) -> Result<Vec<FundingRate>, FeedError> {
        let payload = json!({ "type": "metaAndAssetCtxs" });
        let body = post_json_text(&self.client, Self::URL, &payload).await?;
        Self::parse_funding_rates(&body, Utc::now())
    }
}
