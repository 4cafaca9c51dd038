//! Telegram client and command surface.

use crate::commands::CommandHandler;
use crate::delivery::{ChatSender, TextMode};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Start,
    #[command(description = "Show current funding rates above your threshold")]
    Rates,
    #[command(description = "Subscribe to periodic funding rate reports")]
    Subscribe,
    #[command(description = "Stop periodic reports")]
    Unsubscribe,
    #[command(description = "Show or set your threshold. Usage: /threshold 0.1 (10%) or /threshold 10 (10%)")]
    Threshold(String),
}

/// Telegram bot wrapper.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Dispatch incoming commands to `handler` until the dispatcher stops.
    ///
    /// teloxide runs each update in its own task; messages that are not one
    /// of [`Command`] are dropped.
    pub async fn run(&self, handler: Arc<CommandHandler>) {
        let schema = Update::filter_message().filter_command::<Command>().endpoint(
            move |msg: Message, cmd: Command| {
                let handler = Arc::clone(&handler);
                async move {
                    handler.handle(msg.chat.id.0, cmd).await;
                    respond(())
                }
            },
        );

        info!("Telegram dispatcher started");
        Dispatcher::builder(self.bot.clone(), schema)
            .default_handler(|_| async {
                debug!("Ignoring non-command update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[async_trait]
impl ChatSender for TelegramBot {
    async fn send(&self, chat_id: i64, text: &str, mode: TextMode) -> Result<(), TelegramError> {
        if text.trim().is_empty() {
            return Err(TelegramError::Rejected("empty message text".to_string()));
        }

        let request = self.bot.send_message(ChatId(chat_id), text);
        match mode {
            TextMode::Html => {
                request.parse_mode(ParseMode::Html).await?;
            }
            TextMode::Plain => {
                request.await?;
            }
        }
        Ok(())
    }
}
