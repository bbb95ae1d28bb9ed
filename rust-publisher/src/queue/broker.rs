//! Broker abstraction.
//!
//! A publish walks the same three handles on every backend: a [`Broker`]
//! opens a [`BrokerConnection`], which opens a [`QueueSender`] bound to one
//! queue. Connections and senders are released with `close`, which consumes
//! them so a closed handle cannot be reused.

use async_trait::async_trait;

use super::types::{OutboundMessage, Receipt};
use crate::error::{PublishError, Result};

/// A broker that can be connected to.
#[async_trait]
pub trait Broker: Send + Sync {
    type Connection: BrokerConnection;

    /// Establish a connection, failing with `Connection` when unreachable.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// An open broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync + Sized {
    type Sender: QueueSender;

    /// Bind a sender to an existing queue, failing with `NotFound` otherwise.
    async fn open_sender(&self, queue: &str) -> Result<Self::Sender>;

    /// Release the connection. Close failures are logged, not returned.
    async fn close(self);
}

/// A handle that transmits messages to one queue.
#[async_trait]
pub trait QueueSender: Send + Sync + Sized {
    /// Send one message and wait for the broker to accept it.
    async fn send(&self, message: &OutboundMessage) -> Result<Receipt>;

    /// Release the sender. Close failures are logged, not returned.
    async fn close(self);
}

/// Reject queue names no broker could hold.
pub fn validate_queue_name(queue: &str) -> Result<()> {
    if queue.trim().is_empty() {
        return Err(PublishError::NotFound("queue name is empty".into()));
    }
    Ok(())
}
