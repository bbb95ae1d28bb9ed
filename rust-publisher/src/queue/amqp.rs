//! AMQP 0-9-1 backend using lapin.
//!
//! Messages go through the default exchange with the queue name as routing
//! key. The queue is declared passively, so it must already exist, and the
//! channel runs in confirm mode so a send returns only after the broker acks.

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    protocol::{AMQPErrorKind, AMQPSoftError},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tracing::{info, warn};
use url::Url;

use super::broker::{validate_queue_name, Broker, BrokerConnection, QueueSender};
use super::types::{OutboundMessage, Receipt};
use crate::error::{PublishError, Result};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// A RabbitMQ-compatible broker addressed by an `amqp://` or `amqps://` URI.
#[derive(Debug, Clone)]
pub struct AmqpBroker {
    url: Url,
}

impl AmqpBroker {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

pub struct AmqpConnection {
    connection: Connection,
}

pub struct AmqpSender {
    channel: Channel,
    queue: String,
}

#[async_trait]
impl Broker for AmqpBroker {
    type Connection = AmqpConnection;

    async fn connect(&self) -> Result<AmqpConnection> {
        info!(host = ?self.url.host_str(), "amqp_connecting");

        let connection = Connection::connect(self.url.as_str(), ConnectionProperties::default())
            .await
            .map_err(|e| PublishError::Connection(format!("Failed to connect to broker: {e}")))?;

        info!("amqp_connected");

        Ok(AmqpConnection { connection })
    }
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    type Sender = AmqpSender;

    async fn open_sender(&self, queue: &str) -> Result<AmqpSender> {
        validate_queue_name(queue)?;

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| PublishError::Connection(format!("Failed to create channel: {e}")))?;

        if let Err(e) = channel.confirm_select(ConfirmSelectOptions::default()).await {
            close_channel(&channel).await;
            return Err(PublishError::Connection(format!(
                "Failed to enable publisher confirms: {e}"
            )));
        }

        // Passive declare only checks existence; the broker closes the
        // channel itself when it fails.
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_declare_error(queue, e))?;

        info!(queue = queue, "amqp_sender_opened");

        Ok(AmqpSender {
            channel,
            queue: queue.to_string(),
        })
    }

    async fn close(self) {
        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "amqp_connection_close_error");
        }
        info!("amqp_connection_closed");
    }
}

#[async_trait]
impl QueueSender for AmqpSender {
    async fn send(&self, message: &OutboundMessage) -> Result<Receipt> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                message.body.as_bytes(),
                BasicProperties::default()
                    .with_delivery_mode(PERSISTENT)
                    .with_content_type(message.content_type.into())
                    .with_message_id(message.message_id.clone().into()),
            )
            .await
            .map_err(|e| PublishError::Transport(format!("Failed to publish: {e}")))?
            .await
            .map_err(|e| PublishError::Transport(format!("Failed to confirm publish: {e}")))?;

        if confirmation.is_nack() {
            return Err(PublishError::Transport(format!(
                "broker refused message for queue '{}'",
                self.queue
            )));
        }

        info!(
            queue = %self.queue,
            message_id = %message.message_id,
            body_length = message.body.len(),
            "amqp_message_sent"
        );

        Ok(Receipt {
            message_id: message.message_id.clone(),
            queue: self.queue.clone(),
            body_length: message.body.len(),
        })
    }

    async fn close(self) {
        close_channel(&self.channel).await;
        info!(queue = %self.queue, "amqp_sender_closed");
    }
}

async fn close_channel(channel: &Channel) {
    if !channel.status().connected() {
        return;
    }
    if let Err(e) = channel.close(200, "Normal shutdown").await {
        warn!(error = %e, "amqp_channel_close_error");
    }
}

fn classify_declare_error(queue: &str, e: lapin::Error) -> PublishError {
    if is_not_found(&e) {
        PublishError::NotFound(format!("queue '{queue}' does not exist: {e}"))
    } else {
        PublishError::Connection(format!("Failed to check queue '{queue}': {e}"))
    }
}

fn is_not_found(e: &lapin::Error) -> bool {
    matches!(
        e,
        lapin::Error::ProtocolError(amqp) if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND))
    )
}
