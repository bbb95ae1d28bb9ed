//! Order sender - publishes one order message to the configured queue.
//!
//! Connects to the broker named by `SERVICEBUS_CONNECTION_STR`, sends the
//! sample order to `SERVICEBUS_QUEUE_NAME` and exits. Any broker error ends
//! the process with a non-zero status.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orderbus::queue::{publish_with_options, OrderMessage, PublishOptions};
use orderbus::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    tracing::info!("sender_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        queue = %config.queue_name,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    // The body itself is logged as `message_sending` once the sender is open.
    let order = OrderMessage::sample();
    let receipt = publish_with_options(
        &config.connection_str,
        &config.queue_name,
        &order,
        &PublishOptions::from(&config),
    )
    .await
    .context("Failed to send message")?;

    println!("Message sent successfully!");
    tracing::info!(message_id = %receipt.message_id, "sender_finished");

    Ok(())
}
