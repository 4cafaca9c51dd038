//! HTML funding-rate reports.

use chrono::DateTime;
use funding_core::{FundingRate, RatesSnapshot, UNKNOWN_FUNDING_TIME};
use teloxide::utils::html::escape;
use tracing::debug;

/// Lines shown per exchange before the overflow notice.
pub const MAX_RATES_PER_EXCHANGE: usize = 20;

pub const SEPARATOR: &str = "────────────────────────────";

/// Sent instead of a report when nothing passes the threshold.
pub const NO_RATES_ABOVE_THRESHOLD: &str = "<i>No funding rates exceed the threshold</i>";

/// Sent by `/rates` while the cache has not been filled yet.
pub const NO_RATES_AVAILABLE: &str = "<i>No funding rates available yet, try again shortly</i>";

/// Exchange whose next-funding time is shown without a zone.
const ZONELESS_EXCHANGE: &str = "HTX";

pub fn is_placeholder(report: &str) -> bool {
    report == NO_RATES_ABOVE_THRESHOLD
}

/// Render every exchange in `rates`, in exchange-name order.
///
/// Returns [`NO_RATES_ABOVE_THRESHOLD`] when no exchange has a rate at or
/// above `threshold`.
pub fn format_rates(rates: &RatesSnapshot, threshold: f64) -> String {
    let blocks: Vec<String> = rates
        .iter()
        .filter_map(|(exchange, rates)| format_exchange_rates(exchange, rates, threshold))
        .collect();

    if blocks.is_empty() {
        return NO_RATES_ABOVE_THRESHOLD.to_string();
    }
    blocks.join("\n")
}

/// Block for one exchange, or `None` when none of its rates pass.
pub fn format_exchange_rates(
    exchange: &str,
    rates: &[FundingRate],
    threshold: f64,
) -> Option<String> {
    let mut sorted: Vec<&FundingRate> = rates.iter().collect();
    // Vec::sort_by is stable
    sorted.sort_by(|a, b| b.abs_rate().total_cmp(&a.abs_rate()));

    let lines: Vec<String> = sorted
        .iter()
        .filter(|rate| rate.exceeds(threshold))
        .map(|rate| format_rate_line(exchange, rate))
        .collect();

    debug!(
        exchange = exchange,
        total = rates.len(),
        kept = lines.len(),
        filtered = rates.len() - lines.len(),
        threshold = threshold,
        "Formatted funding rates"
    );

    if lines.is_empty() {
        return None;
    }

    let shown = lines.len().min(MAX_RATES_PER_EXCHANGE);
    let mut parts = vec![
        format!("\n<b>📈 {}</b>", escape(exchange)),
        format!("<pre>{}</pre>", lines[..shown].join("\n")),
    ];
    if lines.len() > shown {
        parts.push(format!("<i>... and {} more records</i>", lines.len() - shown));
    }
    parts.push(SEPARATOR.to_string());

    Some(parts.join("\n"))
}

/// Single-exchange report that names the exchange even when empty.
pub fn format_exchange_report(exchange: &str, rates: &[FundingRate], threshold: f64) -> String {
    format_exchange_rates(exchange, rates, threshold).unwrap_or_else(|| {
        format!(
            "<i>No funding rates on {} exceed {:.2}%</i>",
            escape(exchange),
            threshold * 100.0
        )
    })
}

/// `BTCUSDT       +0.0100%  ⬆️  Long → Short  (next funding: 14.11.2023 22:13 UTC)`
pub fn format_rate_line(exchange: &str, rate: &FundingRate) -> String {
    let direction = rate.direction();
    format!(
        "{:<12} {:+8.4}%  {}  {:<12}  (next funding: {})",
        escape(&rate.symbol),
        rate.rate_pct(),
        direction.glyph(),
        direction.label(),
        format_next_funding(exchange, &rate.next_funding)
    )
}

/// `dd.mm.YYYY HH:MM` in the timestamp's own offset, plus a zone suffix.
///
/// The sentinel and anything that is not RFC 3339 pass through unchanged.
pub fn format_next_funding(exchange: &str, raw: &str) -> String {
    if raw == UNKNOWN_FUNDING_TIME {
        return raw.to_string();
    }

    let Ok(time) = DateTime::parse_from_rfc3339(raw) else {
        return escape(raw);
    };

    let stamp = time.format("%d.%m.%Y %H:%M").to_string();
    if exchange == ZONELESS_EXCHANGE {
        return stamp;
    }

    if time.offset().local_minus_utc() == 0 {
        format!("{} UTC", stamp)
    } else {
        format!("{} {}", stamp, time.format("%:z"))
    }
}
