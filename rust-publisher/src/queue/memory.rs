//! In-memory broker that records every handle it gives out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::broker::{validate_queue_name, Broker, BrokerConnection, QueueSender};
use super::types::{OutboundMessage, Receipt};
use crate::error::{PublishError, Result};

#[derive(Debug, Default)]
pub struct MemoryState {
    pub queues: HashMap<String, Vec<OutboundMessage>>,
    pub unreachable: bool,
    pub fail_sends: bool,
    /// Sender setup fails with a connection error instead of succeeding
    pub fail_open_sender: bool,
    pub open_connections: usize,
    pub open_senders: usize,
    /// Ordered trace of broker-side calls
    pub events: Vec<&'static str>,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBroker {
    pub fn with_queue(queue: &str) -> Self {
        let broker = MemoryBroker::default();
        broker.state().queues.insert(queue.to_string(), Vec::new());
        broker
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn messages(&self, queue: &str) -> Vec<OutboundMessage> {
        self.state().queues.get(queue).cloned().unwrap_or_default()
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemorySender {
    state: Arc<Mutex<MemoryState>>,
    queue: String,
}

#[async_trait]
impl Broker for MemoryBroker {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection> {
        let mut state = self.state();
        if state.unreachable {
            return Err(PublishError::Connection("broker unreachable".into()));
        }
        state.open_connections += 1;
        state.events.push("connect");
        Ok(MemoryConnection {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    type Sender = MemorySender;

    async fn open_sender(&self, queue: &str) -> Result<MemorySender> {
        validate_queue_name(queue)?;
        let mut state = self.state.lock().unwrap();
        state.events.push("open_sender");
        if state.fail_open_sender {
            return Err(PublishError::Connection("channel refused".into()));
        }
        if !state.queues.contains_key(queue) {
            return Err(PublishError::NotFound(queue.to_string()));
        }
        state.open_senders += 1;
        Ok(MemorySender {
            state: self.state.clone(),
            queue: queue.to_string(),
        })
    }

    async fn close(self) {
        let mut state = self.state.lock().unwrap();
        state.open_connections -= 1;
        state.events.push("close_connection");
    }
}

#[async_trait]
impl QueueSender for MemorySender {
    async fn send(&self, message: &OutboundMessage) -> Result<Receipt> {
        let mut state = self.state.lock().unwrap();
        state.events.push("send");
        if state.fail_sends {
            return Err(PublishError::Transport("link detached".into()));
        }
        state
            .queues
            .entry(self.queue.clone())
            .or_default()
            .push(message.clone());
        Ok(Receipt {
            message_id: message.message_id.clone(),
            queue: self.queue.clone(),
            body_length: message.body.len(),
        })
    }

    async fn close(self) {
        let mut state = self.state.lock().unwrap();
        state.open_senders -= 1;
        state.events.push("close_sender");
    }
}
