//! Shared REST plumbing for the exchange adapters.

use crate::error::FeedError;
use chrono::{DateTime, SecondsFormat};
use funding_core::UNKNOWN_FUNDING_TIME;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request timeout for exchange REST calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "funding-screener";

/// Build the HTTP client used by every adapter.
pub fn http_client() -> reqwest::Client {
    client_with_agent(USER_AGENT)
}

/// Falls back to a stock client if the configured one cannot be built.
fn client_with_agent(user_agent: &str) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                "Failed to build configured HTTP client, using defaults without request timeout"
            );
            reqwest::Client::new()
        }
    }
}

/// GET `url` and return the body, failing on non-success status codes.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, FeedError> {
    debug!(url = url, "GET");
    let response = client.get(url).send().await?;
    read_body(response).await
}

async fn read_body(response: reqwest::Response) -> Result<String, FeedError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FeedError::Api {
            status: status.as_u16(),
            body: body.chars().take(256).collect(),
        });
    }

    Ok(body)
}

/// POST `payload` as JSON to `url` and return the body.
pub async fn post_json_text(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
) -> Result<String, FeedError> {
    debug!(url = url, "POST");
    let response = client.post(url).json(payload).send().await?;
    read_body(response).await
}

/// Parse a timestamp that venues send as seconds since the epoch.
pub fn secs_to_rfc3339(secs: i64) -> String {
    ms_to_rfc3339(secs.saturating_mul(1000))
}

/// Render a millisecond epoch timestamp as RFC 3339 UTC.
///
/// Zero, negative or out-of-range values map to [`UNKNOWN_FUNDING_TIME`].
pub fn ms_to_rfc3339(ms: i64) -> String {
    if ms <= 0 {
        return UNKNOWN_FUNDING_TIME.to_string();
    }
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => UNKNOWN_FUNDING_TIME.to_string(),
    }
}

/// Same as [`ms_to_rfc3339`] for venues that send the timestamp as a string.
pub fn ms_str_to_rfc3339(ms: Option<&str>) -> String {
    ms.and_then(|s| s.trim().parse::<i64>().ok())
        .map(ms_to_rfc3339)
        .unwrap_or_else(|| UNKNOWN_FUNDING_TIME.to_string())
}

/// Parse a rate that venues send as a decimal string.
pub fn parse_rate(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ms_to_rfc3339() {
        assert_eq!(ms_to_rfc3339(1_700_000_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(ms_to_rfc3339(0), UNKNOWN_FUNDING_TIME);
        assert_eq!(ms_to_rfc3339(-5), UNKNOWN_FUNDING_TIME);
    }

    #[test]
    fn test_ms_str_to_rfc3339() {
        assert_eq!(ms_str_to_rfc3339(Some("1700000000000")), "2023-11-14T22:13:20Z");
        assert_eq!(ms_str_to_rfc3339(Some("")), UNKNOWN_FUNDING_TIME);
        assert_eq!(ms_str_to_rfc3339(None), UNKNOWN_FUNDING_TIME);
    }

    #[test]
    fn test_secs_to_rfc3339() {
        assert_eq!(secs_to_rfc3339(1_700_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(secs_to_rfc3339(0), UNKNOWN_FUNDING_TIME);
    }

    #[test]
    fn test_invalid_user_agent_falls_back_to_stock_client() {
        // A newline is not a valid header value, so the builder fails.
        let client = client_with_agent("bad\nagent");
        assert!(client.get("https://example.com").build().is_ok());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(Some("0.0001")), Some(0.0001));
        assert_eq!(parse_rate(Some("-0.00375")), Some(-0.00375));
        assert_eq!(parse_rate(Some("")), None);
        assert_eq!(parse_rate(Some("NaN")), None);
        assert_eq!(parse_rate(None), None);
    }
}
