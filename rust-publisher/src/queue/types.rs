//! Message types carried on the order queue.

use serde::{Deserialize, Serialize};

/// Content type of every message body this crate produces.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An order placed on the queue.
///
/// Field order here is the order on the wire: consumers see `orderId` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    /// Order identifier, e.g. `ORD-123`
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Names of the ordered items
    pub items: Vec<String>,
}

impl OrderMessage {
    /// Create a new order message.
    pub fn new(order_id: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            order_id: order_id.into(),
            items,
        }
    }

    /// The demo order sent by `orderbus-send`.
    pub fn sample() -> Self {
        Self::new(
            "ORD-123",
            vec!["Laptop".to_string(), "Mouse".to_string(), "Keyboard".to_string()],
        )
    }
}

/// A serialized message ready for a sender.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Client-assigned id, unique per send
    pub message_id: String,
    pub content_type: &'static str,
    /// UTF-8 encoded body
    pub body: String,
}

impl OutboundMessage {
    /// Wrap an encoded JSON body with a fresh message id.
    pub fn json(body: String) -> Self {
        Self {
            message_id: new_message_id(),
            content_type: JSON_CONTENT_TYPE,
            body,
        }
    }
}

/// Confirmation returned once the broker accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message_id: String,
    pub queue: String,
    pub body_length: usize,
}

/// 128 random bits as lowercase hex.
fn new_message_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
