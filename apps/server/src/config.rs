//! Application configuration from the environment.

use funding_alerts::default_threshold_from;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_FUNDING_QUEUE: &str = "funding_rates";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,
}

/// Queue publishing settings; present only when `AMQP_URL` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Broker URL (`amqp://` or the management `http://` endpoint)
    pub url: String,
    /// Queue receiving every observed rate
    pub queue: String,
    /// Per-message TTL in milliseconds, 0 for none
    pub ttl_ms: u64,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Telegram bot token.
    pub telegram_token: String,
    /// Threshold for chats that never set one, as a fraction.
    pub default_threshold: f64,
    /// Queue publishing, if enabled.
    pub queue: Option<QueueSettings>,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::MissingToken)?;
        let default_threshold = default_threshold_from(get("DEFAULT_FUNDING_THRESHOLD").as_deref());

        let queue = get("AMQP_URL").map(|url| QueueSettings {
            url,
            queue: get("FUNDING_QUEUE").unwrap_or_else(|| DEFAULT_FUNDING_QUEUE.to_string()),
            ttl_ms: parse_ttl(get("FUNDING_TTL_MS").as_deref()),
        });

        Ok(Self {
            telegram_token,
            default_threshold,
            queue,
        })
    }
}

fn parse_ttl(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    match raw.trim().parse::<u64>() {
        Ok(ttl) => ttl,
        Err(_) => {
            warn!(value = raw, "Invalid FUNDING_TTL_MS, publishing without TTL");
            0
        }
    }
}
