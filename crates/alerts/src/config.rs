//! Alert engine configuration.

use crate::delivery::MAX_MESSAGE_LEN;
use crate::notifier::DEFAULT_BROADCAST_INTERVAL;
use crate::threshold::DEFAULT_THRESHOLD;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the subscription store, broadcaster and delivery.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Settings snapshot file (subscribers and thresholds)
    pub settings_path: PathBuf,
    /// Threshold for chats that never set one, as a fraction
    pub default_threshold: f64,
    /// Pause between broadcast cycles
    pub broadcast_interval: Duration,
    /// Maximum characters per delivered message
    pub max_message_len: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("settings.json"),
            default_threshold: DEFAULT_THRESHOLD,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_config_default() {
        let config = AlertConfig::default();
        assert_eq!(config.settings_path, PathBuf::from("settings.json"));
        assert_eq!(config.broadcast_interval, Duration::from_secs(300));
        assert_eq!(config.max_message_len, 4000);
        assert!(config.default_threshold > 0.0);
    }
}
