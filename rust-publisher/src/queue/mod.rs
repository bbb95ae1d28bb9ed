//! Queue module for publishing order messages.
//!
//! This module provides:
//! - Message types and the JSON body codec
//! - Connection target parsing (Service Bus connection strings, AMQP URIs)
//! - Broker backends behind a small connect / sender / send abstraction
//! - The one-shot `publish` operation
//!
//! ## Flow
//!
//! ```text
//! parse target → connect → open sender → encode → send → close sender → close connection
//! ```

pub mod amqp;
pub mod broker;
pub mod codec;
pub mod publisher;
pub mod sas;
pub mod servicebus;
pub mod target;
pub mod types;

#[cfg(test)]
mod memory;

pub use broker::{Broker, BrokerConnection, QueueSender};
pub use publisher::{publish, publish_with, publish_with_options, PublishOptions};
pub use target::{ConnectionTarget, Credential, ServiceBusTarget};
pub use types::{OrderMessage, OutboundMessage, Receipt, JSON_CONTENT_TYPE};
