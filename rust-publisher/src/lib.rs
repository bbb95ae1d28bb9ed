//! Orderbus - order messages over a managed queue.
//!
//! This library provides shared modules for the two binaries:
//! - `orderbus-send`: publishes one order message to a queue and exits
//! - `orderbus-web`: the HTTP function app (hello, login, sales report)
//!
//! ## Publishing
//!
//! ```text
//! OrderMessage → JSON body → Service Bus (HTTPS) or AMQP broker → queue
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::PublishError;
pub use queue::{publish, OrderMessage, PublishOptions, Receipt};
pub use web::AppState;
