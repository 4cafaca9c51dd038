//! Alert threshold parsing.

use std::fmt;
use thiserror::Error;

/// Threshold used when neither the user nor the configuration sets one (0.1%).
pub const DEFAULT_THRESHOLD: f64 = 0.001;

/// Where a subscriber's threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOrigin {
    /// Stored for this chat.
    UserSet,
    /// Process-wide default.
    Default,
}

impl fmt::Display for ThresholdOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdOrigin::UserSet => write!(f, "user-set"),
            ThresholdOrigin::Default => write!(f, "default"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("not a number: {0:?}")]
    Invalid(String),
    #[error("threshold must be positive")]
    NotPositive,
}

/// Parse a user-supplied threshold into a fraction.
///
/// `0.5` means 50%. Values above 1 are read as percentages (`50` means 50%).
/// A trailing `%` is dropped before that rule applies, so `0.5%` is also 50%.
pub fn parse_threshold(input: &str) -> Result<f64, ThresholdError> {
    let trimmed = input.trim();
    let number = trimmed.strip_suffix('%').map_or(trimmed, str::trim);

    let value: f64 = number
        .parse()
        .map_err(|_| ThresholdError::Invalid(input.to_string()))?;

    if !value.is_finite() {
        return Err(ThresholdError::Invalid(input.to_string()));
    }
    if value <= 0.0 {
        return Err(ThresholdError::NotPositive);
    }

    if value > 1.0 {
        Ok(value / 100.0)
    } else {
        Ok(value)
    }
}

/// Resolve the configured default, falling back to [`DEFAULT_THRESHOLD`].
pub fn default_threshold_from(raw: Option<&str>) -> f64 {
    raw.filter(|s| !s.trim().is_empty())
        .and_then(|s| parse_threshold(s).ok())
        .unwrap_or(DEFAULT_THRESHOLD)
}
