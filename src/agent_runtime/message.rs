//! The agent message envelope and priority ordering.
//!
//! Shape is grounded on the source's `A2AMessage`/`MessagePriority`: the wire protocol
//! (HTTP/WebSocket transports, service discovery) is out of scope here, only the
//! envelope fields and the priority/FIFO ordering contract survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessagePriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Response,
    Event,
    Command,
    Query,
    Notification,
    Heartbeat,
    Acknowledgment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub priority: MessagePriority,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub reply_to: Option<String>,
    pub ttl: Option<std::time::Duration>,
    pub retry_count: u32,
}

/// A message exchanged between agents. Unknown fields on the wire are ignored by
/// receivers (enforced by `#[serde(default)]` on every optional field here); unknown
/// `MessageKind`s are routed to the dead-letter store rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub kind: MessageKind,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub payload: Value,
    pub metadata: EnvelopeMetadata,
}

impl Envelope {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: MessageKind::Request,
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            payload,
            metadata: EnvelopeMetadata {
                priority: MessagePriority::Normal,
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4().to_string(),
                reply_to: None,
                ttl: None,
                retry_count: 0,
            },
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.metadata.priority = priority;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = correlation_id.into();
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.metadata.ttl {
            Some(ttl) => match chrono::Duration::from_std(ttl) {
                Ok(ttl) => now - self.metadata.timestamp > ttl,
                Err(_) => false,
            },
            None => false,
        }
    }
}

/// Wraps an `Envelope` with a monotonic sequence number so a `BinaryHeap` orders by
/// `(priority, send order)`: higher priority first, and within equal priority, the
/// earliest-sent message first (a max-heap needs the sequence reversed to get FIFO).
#[derive(Debug, Clone)]
pub struct PrioritizedEnvelope {
    pub envelope: Envelope,
    pub sequence: u64,
}

impl PartialEq for PrioritizedEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.envelope.metadata.priority == other.envelope.metadata.priority && self.sequence == other.sequence
    }
}

impl Eq for PrioritizedEnvelope {}

impl PartialOrd for PrioritizedEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedEnvelope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.envelope
            .metadata
            .priority
            .cmp(&other.envelope.metadata.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
