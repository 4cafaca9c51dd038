//! Telegram side of the funding screener.
//!
//! Keeps subscribers and their thresholds, renders HTML reports from the
//! rates cache, splits them into Telegram-sized messages, broadcasts them on
//! a schedule and answers chat commands.

pub mod commands;
pub mod config;
pub mod delivery;
pub mod notifier;
pub mod report;
pub mod store;
pub mod telegram;
pub mod threshold;

pub use commands::CommandHandler;
pub use config::AlertConfig;
pub use delivery::{split_message, ChatSender, DeliveryReport, MessageDelivery, TextMode, MAX_MESSAGE_LEN};
pub use notifier::{BroadcastSummary, Broadcaster, DEFAULT_BROADCAST_INTERVAL};
pub use report::{
    format_exchange_report, format_rates, is_placeholder, NO_RATES_ABOVE_THRESHOLD,
    NO_RATES_AVAILABLE,
};
pub use store::{Settings, StoreError, SubscriptionStore};
pub use telegram::{Command, TelegramBot, TelegramError};
pub use threshold::{
    default_threshold_from, parse_threshold, ThresholdError, ThresholdOrigin, DEFAULT_THRESHOLD,
};
