//! Direction of the funding payment.

use serde::{Deserialize, Serialize};

/// Which side of a perpetual contract pays at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayDirection {
    /// Positive rate: longs pay shorts.
    LongPaysShort,
    /// Negative rate: shorts pay longs.
    ShortPaysLong,
    /// Rate is exactly zero.
    Neutral,
}

impl PayDirection {
    pub fn from_rate(rate: f64) -> Self {
        if rate > 0.0 {
            PayDirection::LongPaysShort
        } else if rate < 0.0 {
            PayDirection::ShortPaysLong
        } else {
            PayDirection::Neutral
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            PayDirection::LongPaysShort => "⬆️",
            PayDirection::ShortPaysLong => "⬇️",
            PayDirection::Neutral => "",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PayDirection::LongPaysShort => "Long → Short",
            PayDirection::ShortPaysLong => "Short → Long",
            PayDirection::Neutral => "",
        }
    }
}
