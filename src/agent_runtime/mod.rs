//! Agent Runtime (C5): lifecycle, message envelopes, and the in-process priority bus.

pub mod bus;
pub mod lifecycle;
pub mod message;

pub use bus::{CancellationToken, DeadLetter, MessageBus};
pub use lifecycle::{AgentHealth, AgentLifecycle};
pub use message::{Envelope, EnvelopeMetadata, MessageKind, MessagePriority, PrioritizedEnvelope};
