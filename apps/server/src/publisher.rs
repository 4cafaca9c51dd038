//! Republishes observed funding rates to a RabbitMQ queue.
//!
//! Publishing goes through the broker's management HTTP API
//! (`POST /api/exchanges/{vhost}/amq.default/publish`), so no AMQP client is
//! needed. Every rate is also written to its exchange's log file.

use crate::config::QueueSettings;
use crate::exchange_log::ExchangeLogs;
use async_trait::async_trait;
use funding_core::FundingRate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of the channel between the rates cache and the publisher task.
pub const PUBLISH_QUEUE_CAPACITY: usize = 10_000;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CREDENTIALS: &str = "guest";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Broker returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Message not routed to queue {0}")]
    NotRouted(String),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait RatePublisher: Send + Sync {
    async fn publish(&self, rate: &FundingRate) -> Result<(), PublishError>;
}

/// Management API endpoint and credentials derived from a broker URL.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerEndpoint {
    pub publish_url: Url,
    pub username: String,
    pub password: String,
}

impl BrokerEndpoint {
    /// Accepts `amqp(s)://user:pass@host[:port]/vhost` (mapped to the
    /// management port) or a management `http(s)://` base URL.
    pub fn parse(raw: &str) -> Result<Self, PublishError> {
        let (http_url, management_port) = if let Some(rest) = raw.strip_prefix("amqp://") {
            (format!("http://{}", rest), Some(15672))
        } else if let Some(rest) = raw.strip_prefix("amqps://") {
            (format!("https://{}", rest), Some(15671))
        } else {
            (raw.to_string(), None)
        };

        let mut url =
            Url::parse(&http_url).map_err(|e| PublishError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PublishError::InvalidUrl(raw.to_string()));
        }

        let username = non_empty_or_default(url.username());
        let password = non_empty_or_default(url.password().unwrap_or_default());

        // For amqp URLs the path is the vhost; for http URLs it is a base path
        let (base, vhost) = match management_port {
            Some(_) => {
                let vhost = url.path().trim_start_matches('/');
                let vhost = if vhost.is_empty() { "%2F" } else { vhost };
                (String::new(), vhost.to_string())
            }
            None => (url.path().trim_end_matches('/').to_string(), "%2F".to_string()),
        };

        url.set_username("")
            .and_then(|_| url.set_password(None))
            .map_err(|_| PublishError::InvalidUrl(raw.to_string()))?;
        if let Some(port) = management_port {
            url.set_port(Some(port))
                .map_err(|_| PublishError::InvalidUrl(raw.to_string()))?;
        }
        url.set_path(&format!("{}/api/exchanges/{}/amq.default/publish", base, vhost));
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self {
            publish_url: url,
            username,
            password,
        })
    }
}

fn non_empty_or_default(value: &str) -> String {
    if value.is_empty() {
        DEFAULT_CREDENTIALS.to_string()
    } else {
        value.to_string()
    }
}

/// Request body for one rate; `expiration` is set only for a positive TTL.
pub fn publish_body(rate: &FundingRate, queue: &str, ttl_ms: u64) -> Result<Value, PublishError> {
    let payload = serde_json::to_string(rate)?;

    let mut properties = Map::new();
    properties.insert("content_type".to_string(), json!("application/json"));
    properties.insert("delivery_mode".to_string(), json!(2));
    if ttl_ms > 0 {
        properties.insert("expiration".to_string(), json!(ttl_ms.to_string()));
    }

    Ok(json!({
        "properties": properties,
        "routing_key": queue,
        "payload": payload,
        "payload_encoding": "string",
    }))
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    routed: bool,
}

/// Publishes through the RabbitMQ management API.
pub struct RabbitHttpPublisher {
    client: reqwest::Client,
    endpoint: BrokerEndpoint,
    queue: String,
    ttl_ms: u64,
}

impl RabbitHttpPublisher {
    pub fn new(settings: &QueueSettings) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(PUBLISH_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: BrokerEndpoint::parse(&settings.url)?,
            queue: settings.queue.clone(),
            ttl_ms: settings.ttl_ms,
        })
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl RatePublisher for RabbitHttpPublisher {
    async fn publish(&self, rate: &FundingRate) -> Result<(), PublishError> {
        let body = publish_body(rate, &self.queue, self.ttl_ms)?;

        let response = self
            .client
            .post(self.endpoint.publish_url.clone())
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: PublishResponse = response.json().await?;
        if !result.routed {
            return Err(PublishError::NotRouted(self.queue.clone()));
        }
        Ok(())
    }
}

/// Counters for one publisher task lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub received: u64,
    pub published: u64,
    pub failed: u64,
}

/// Drain `rx` until every sender is gone.
///
/// Each rate is logged to its exchange file and, if a publisher is
/// configured, published; a failed publish is logged and the next rate is
/// processed.
pub async fn run_publisher(
    mut rx: mpsc::Receiver<FundingRate>,
    publisher: Option<Arc<dyn RatePublisher>>,
    logs: Arc<ExchangeLogs>,
) -> PublisherStats {
    info!(enabled = publisher.is_some(), "Rate publisher started");
    let mut stats = PublisherStats::default();

    while let Some(rate) = rx.recv().await {
        stats.received += 1;
        record(
            &logs,
            &rate.exchange,
            &format!(
                "{} rate={:+.4}% next_funding={}",
                rate.symbol,
                rate.rate_pct(),
                rate.next_funding
            ),
        )
        .await;

        let Some(publisher) = &publisher else {
            continue;
        };

        match publisher.publish(&rate).await {
            Ok(()) => {
                stats.published += 1;
                debug!(exchange = %rate.exchange, symbol = %rate.symbol, "Rate published");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(exchange = %rate.exchange, symbol = %rate.symbol, error = %e, "Failed to publish rate");
                record(
                    &logs,
                    &rate.exchange,
                    &format!("publish failed for {}: {}", rate.symbol, e),
                )
                .await;
            }
        }
    }

    info!(
        received = stats.received,
        published = stats.published,
        failed = stats.failed,
        "Rate publisher stopped"
    );
    stats
}

async fn record(logs: &ExchangeLogs, exchange: &str, message: &str) {
    if let Err(e) = logs.log(exchange, message).await {
        warn!(exchange = exchange, error = %e, "Failed to write exchange log");
    }
}
