//! Funding Screener - Telegram bot server
//!
//! Polls perpetual-futures funding rates from several exchanges, reports the
//! ones above each subscriber's threshold and republishes every rate to a
//! message queue.

mod config;
mod exchange_log;
mod publisher;

use clap::Parser;
use config::AppConfig;
use exchange_log::ExchangeLogs;
use publisher::{run_publisher, RabbitHttpPublisher, RatePublisher, PUBLISH_QUEUE_CAPACITY};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use funding_alerts::{
    AlertConfig, Broadcaster, CommandHandler, MessageDelivery, SubscriptionStore, TelegramBot,
    MAX_MESSAGE_LEN,
};
use funding_feeds::{default_sources, RateUpdater, RatesCache};

/// Funding Screener CLI
#[derive(Parser, Debug)]
#[command(name = "funding-screener")]
#[command(about = "Funding rate monitoring Telegram bot", long_about = None)]
struct Args {
    /// Settings file with subscribers and thresholds
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Directory for per-exchange log files
    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Seconds between funding rate refreshes
    #[arg(long, default_value_t = 120)]
    rates_interval_secs: u64,

    /// Seconds between subscriber broadcasts
    #[arg(long, default_value_t = 300)]
    broadcast_interval_secs: u64,

    /// Maximum exchanges refreshed at once
    #[arg(long, default_value_t = 8)]
    max_concurrency: usize,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn build_publisher(config: &AppConfig) -> Option<Arc<dyn RatePublisher>> {
    let settings = config.queue.as_ref()?;
    match RabbitHttpPublisher::new(settings) {
        Ok(publisher) => {
            info!(
                "  Queue: {} via {}",
                settings.queue,
                publisher.endpoint().publish_url
            );
            Some(Arc::new(publisher))
        }
        Err(e) => {
            warn!("Queue publishing disabled: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("🚀 Funding Screener starting...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let alert_config = AlertConfig {
        settings_path: args.settings.clone(),
        default_threshold: config.default_threshold,
        broadcast_interval: Duration::from_secs(args.broadcast_interval_secs),
        max_message_len: MAX_MESSAGE_LEN,
    };

    info!("  Settings: {}", alert_config.settings_path.display());
    info!("  Default threshold: {:.3}%", alert_config.default_threshold * 100.0);
    info!("  Rates interval: {}s", args.rates_interval_secs);
    info!("  Broadcast interval: {}s", args.broadcast_interval_secs);

    // Rate republishing: cache -> channel -> exchange logs + queue
    let logs = Arc::new(ExchangeLogs::new(&args.logs_dir));
    let publisher = build_publisher(&config);
    let (rate_tx, rate_rx) = mpsc::channel(PUBLISH_QUEUE_CAPACITY);
    let publisher_handle = tokio::spawn(run_publisher(rate_rx, publisher, logs));

    let cache = Arc::new(RatesCache::new().with_sink(rate_tx));

    let store = Arc::new(SubscriptionStore::new(
        alert_config.settings_path.clone(),
        alert_config.default_threshold,
    ));
    store.load().await;

    let sources = default_sources();
    info!(
        "  Exchanges: {}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );

    let updater = RateUpdater::new(sources.clone(), cache.clone())
        .with_interval(Duration::from_secs(args.rates_interval_secs))
        .with_max_concurrency(args.max_concurrency);
    let updater_handle = tokio::spawn(updater.run());

    let bot = TelegramBot::new(&config.telegram_token);
    let delivery =
        MessageDelivery::new(Arc::new(bot.clone())).with_max_len(alert_config.max_message_len);

    let broadcaster = Broadcaster::new(store.clone(), cache.clone(), delivery.clone())
        .with_interval(alert_config.broadcast_interval);
    let broadcast_handle = tokio::spawn(async move {
        broadcaster.run().await;
    });

    let handler = Arc::new(CommandHandler::new(store.clone(), cache, sources, delivery));
    let bot_handle = tokio::spawn(async move {
        bot.run(handler).await;
    });

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");

    for handle in [updater_handle, broadcast_handle, bot_handle] {
        handle.abort();
    }
    publisher_handle.abort();

    if let Err(e) = store.save().await {
        error!("Failed to save settings on shutdown: {}", e);
    }

    info!("Funding Screener stopped");
}
