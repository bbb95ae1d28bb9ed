//! One-shot message publishing.
//!
//! A publish is strictly sequential: connect, open a sender for the queue,
//! encode the payload, send it, then close the sender and the connection.
//! Both handles are closed on every path once acquired, and nothing is
//! retried.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use super::amqp::AmqpBroker;
use super::broker::{Broker, BrokerConnection, QueueSender};
use super::codec;
use super::servicebus::ServiceBusBroker;
use super::target::ConnectionTarget;
use super::types::{OutboundMessage, Receipt};
use crate::error::Result;
use crate::Config;

/// Client-side knobs the broker backends honour.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Upper bound for a single request to the broker
    pub request_timeout: Duration,
    /// Lifetime of SAS tokens signed for a send
    pub token_ttl_secs: u64,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            token_ttl_secs: 3600,
        }
    }
}

impl From<&Config> for PublishOptions {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            token_ttl_secs: config.sas_token_ttl_secs,
        }
    }
}

/// Publish `payload` as one JSON message to `queue_name`.
pub async fn publish<T>(connection_target: &str, queue_name: &str, payload: &T) -> Result<Receipt>
where
    T: Serialize + ?Sized,
{
    publish_with_options(connection_target, queue_name, payload, &PublishOptions::default()).await
}

/// [`publish`] with explicit client options.
pub async fn publish_with_options<T>(
    connection_target: &str,
    queue_name: &str,
    payload: &T,
    options: &PublishOptions,
) -> Result<Receipt>
where
    T: Serialize + ?Sized,
{
    let target = ConnectionTarget::parse(connection_target)?;
    let backend = target.backend();

    info!(backend = backend, queue = queue_name, "publish_starting");

    let result = match target {
        ConnectionTarget::ServiceBus(target) => match target.check_entity(queue_name) {
            Ok(()) => {
                let broker =
                    ServiceBusBroker::new(target, options.request_timeout, options.token_ttl_secs);
                publish_with(&broker, queue_name, payload).await
            }
            Err(e) => Err(e),
        },
        ConnectionTarget::Amqp(url) => publish_with(&AmqpBroker::new(url), queue_name, payload).await,
    };

    match &result {
        Ok(receipt) => info!(
            backend = backend,
            queue = %receipt.queue,
            message_id = %receipt.message_id,
            body_length = receipt.body_length,
            "publish_complete"
        ),
        Err(e) => error!(
            backend = backend,
            queue = queue_name,
            kind = e.kind(),
            error = %e,
            "publish_failed"
        ),
    }

    result
}

/// Run the publish sequence against any broker.
pub async fn publish_with<B, T>(broker: &B, queue_name: &str, payload: &T) -> Result<Receipt>
where
    B: Broker,
    T: Serialize + ?Sized,
{
    let connection = broker.connect().await?;
    let result = send_on(&connection, queue_name, payload).await;
    connection.close().await;
    result
}

async fn send_on<C, T>(connection: &C, queue_name: &str, payload: &T) -> Result<Receipt>
where
    C: BrokerConnection,
    T: Serialize + ?Sized,
{
    let sender = connection.open_sender(queue_name).await?;

    let result = match codec::encode(payload) {
        Ok(body) => {
            let message = OutboundMessage::json(body);
            info!(
                queue = queue_name,
                message_id = %message.message_id,
                body = %message.body,
                "message_sending"
            );
            sender.send(&message).await
        }
        Err(e) => Err(e),
    };

    sender.close().await;
    result
}
