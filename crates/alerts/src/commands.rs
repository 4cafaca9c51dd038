//! Chat command handling.

use crate::delivery::MessageDelivery;
use crate::report::{format_exchange_report, format_rates, NO_RATES_AVAILABLE};
use crate::store::SubscriptionStore;
use crate::telegram::Command;
use crate::threshold::{parse_threshold, ThresholdError};
use funding_feeds::{FundingSource, RatesCache};
use futures_util::future::join_all;
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;
use tracing::{info, warn};

/// Executes [`Command`]s for one chat at a time.
///
/// Holds no per-chat state of its own; everything lives in the store and the
/// rates cache, so the dispatcher may call it from many tasks at once.
pub struct CommandHandler {
    store: Arc<SubscriptionStore>,
    cache: Arc<RatesCache>,
    sources: Vec<Arc<dyn FundingSource>>,
    delivery: MessageDelivery,
}

impl CommandHandler {
    pub fn new(
        store: Arc<SubscriptionStore>,
        cache: Arc<RatesCache>,
        sources: Vec<Arc<dyn FundingSource>>,
        delivery: MessageDelivery,
    ) -> Self {
        Self {
            store,
            cache,
            sources,
            delivery,
        }
    }

    pub async fn handle(&self, chat_id: i64, command: Command) {
        info!(chat_id = chat_id, command = ?command, "Handling command");

        match command {
            Command::Start => self.help(chat_id).await,
            Command::Rates => self.send_rates(chat_id).await,
            Command::Subscribe => self.subscribe(chat_id).await,
            Command::Unsubscribe => self.unsubscribe(chat_id).await,
            Command::Threshold(arg) => self.threshold(chat_id, arg.trim()).await,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        self.delivery.deliver(chat_id, text).await;
    }

    async fn help(&self, chat_id: i64) {
        let text = format!(
            "Funding rate monitor for perpetual futures.\n\n{}",
            Command::descriptions()
        );
        self.reply(chat_id, &text).await;
    }

    /// Report the cached rates at the chat's threshold, placeholder included.
    pub async fn send_rates(&self, chat_id: i64) {
        if self.cache.is_empty() {
            self.reply(chat_id, NO_RATES_AVAILABLE).await;
            return;
        }

        let (threshold, _) = self.store.threshold(chat_id).await;
        let report = format_rates(&self.cache.all_rates(), threshold);
        self.reply(chat_id, &report).await;
    }

    async fn subscribe(&self, chat_id: i64) {
        let text = if self.store.subscribe(chat_id).await {
            "You are subscribed to funding rate reports!"
        } else {
            "You are already subscribed to funding rate reports."
        };
        self.reply(chat_id, text).await;

        self.push_live_rates(chat_id).await;
    }

    async fn unsubscribe(&self, chat_id: i64) {
        let text = if self.store.unsubscribe(chat_id).await {
            "You have unsubscribed from funding rate reports."
        } else {
            "You were not subscribed."
        };
        self.reply(chat_id, text).await;
    }

    async fn threshold(&self, chat_id: i64, arg: &str) {
        if arg.is_empty() {
            let (value, origin) = self.store.threshold(chat_id).await;
            let text = format!(
                "Current threshold: {:.3}% (source: {})\nUse /threshold X.XXX to set a new one",
                value * 100.0,
                origin
            );
            self.reply(chat_id, &text).await;
            return;
        }

        let value = match parse_threshold(arg) {
            Ok(value) => value,
            Err(ThresholdError::Invalid(_)) => {
                self.reply(
                    chat_id,
                    "Error: provide a valid number, e.g. /threshold 0.1 (10%) or /threshold 10 (10%)",
                )
                .await;
                return;
            }
            Err(ThresholdError::NotPositive) => {
                self.reply(chat_id, "Error: threshold must be a positive number")
                    .await;
                return;
            }
        };

        self.store.set_threshold(chat_id, value).await;
        self.reply(chat_id, &format!("New threshold set: {:.3}%", value * 100.0))
            .await;

        self.send_rates(chat_id).await;
    }

    /// Fetch every exchange live and send one report per exchange.
    async fn push_live_rates(&self, chat_id: i64) {
        let (threshold, _) = self.store.threshold(chat_id).await;

        let fetches = self.sources.iter().map(|source| async move {
            (source.name(), source.fetch_funding_rates().await)
        });

        for (exchange, result) in join_all(fetches).await {
            let text = match result {
                Ok(rates) => format_exchange_report(exchange, &rates, threshold),
                Err(e) => {
                    warn!(exchange = exchange, error = %e, "Live fetch for new subscriber failed");
                    format!(
                        "<i>Failed to fetch funding rates from {}: {}</i>",
                        escape(exchange),
                        escape(&e.to_string())
                    )
                }
            };
            self.reply(chat_id, &text).await;
        }
    }
}
