//! In-process priority message bus (C5).
//!
//! Per-agent mailboxes are a `BinaryHeap<PrioritizedEnvelope>` behind a `tokio::sync::Mutex`,
//! woken by a `tokio::sync::Notify` — the source depends on neither `tokio-util` nor a
//! real broker, so cancellation is a crate-local token built on `tokio::sync::watch`
//! rather than `tokio_util::sync::CancellationToken`. Retry backoff follows the
//! source's saga-step retry loop (`100 * 2^(attempt-1)` ms) generalized to the bus's
//! configurable base/factor/max/attempts.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify, RwLock};
use tracing::{debug, warn};

use crate::config::AgentRuntimeConfig;
use crate::error::{AgentRuntimeError, CrateError, Result};

use super::message::{Envelope, PrioritizedEnvelope};

/// Signaled when a workflow is canceled, a message's ttl elapses, or shutdown begins.
/// Handlers that do not return within the grace window are abandoned (their result is
/// discarded, not retroactively canceled).
#[derive(Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

struct Mailbox {
    queue: Mutex<BinaryHeap<PrioritizedEnvelope>>,
    notify: Notify,
    sequence: AtomicU64,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
        }
    }

    async fn depth(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub error: String,
}

/// In-process, multi-consumer-across-agents / single-writer-per-mailbox message bus.
pub struct MessageBus {
    mailboxes: RwLock<HashMap<String, Arc<Mailbox>>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    config: AgentRuntimeConfig,
}

impl MessageBus {
    pub fn new(config: AgentRuntimeConfig) -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
            dead_letters: Mutex::new(Vec::new()),
            config,
        }
    }

    pub async fn register(&self, agent_id: &str) {
        self.mailboxes
            .write()
            .await
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mailbox::new()));
    }

    async fn mailbox_for(&self, agent_id: &str) -> Option<Arc<Mailbox>> {
        self.mailboxes.read().await.get(agent_id).cloned()
    }

    /// Enqueue `envelope` onto its recipient's mailbox. Fails with `QueueFull` once
    /// the configured depth is exceeded.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        self.register(&envelope.to).await;
        let mailbox = self.mailbox_for(&envelope.to).await.expect("just registered");

        if mailbox.depth().await >= self.config.max_queue_depth {
            return Err(CrateError::AgentRuntime(AgentRuntimeError::QueueFull(envelope.to.clone())));
        }

        let sequence = mailbox.sequence.fetch_add(1, Ordering::SeqCst);
        mailbox
            .queue
            .lock()
            .await
            .push(PrioritizedEnvelope { envelope, sequence });
        mailbox.notify.notify_one();
        Ok(())
    }

    /// Wait for and pop the highest-priority, earliest-sent message addressed to
    /// `agent_id`. Returns `None` if `token` is canceled first.
    pub async fn receive(&self, agent_id: &str, token: &CancellationToken) -> Option<Envelope> {
        self.register(agent_id).await;
        let mailbox = self.mailbox_for(agent_id).await?;

        loop {
            {
                let mut queue = mailbox.queue.lock().await;
                if let Some(top) = queue.pop() {
                    return Some(top.envelope);
                }
            }
            tokio::select! {
                _ = mailbox.notify.notified() => continue,
                _ = token.cancelled() => return None,
            }
        }
    }

    /// Run `handler` against `envelope`, retrying with exponential backoff
    /// (`retry_base_ms * retry_factor^(attempt-1)`, capped at `retry_max_ms`) up to
    /// `max_retry_attempts`. On exhaustion the envelope moves to the dead-letter store.
    pub async fn dispatch_with_retry<F, Fut>(&self, envelope: Envelope, handler: F) -> Result<()>
    where
        F: Fn(Envelope) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let max_attempts = self.config.max_retry_attempts + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                debug!(attempt, max_attempts, "retrying message dispatch");
            }
            match handler(envelope.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "message handler failed");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        let delay_ms = (self.config.retry_base_ms as f64
                            * self.config.retry_factor.powi(attempt as i32 - 1))
                        .min(self.config.retry_max_ms as f64) as u64;
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            CrateError::AgentRuntime(AgentRuntimeError::RetriesExhausted(envelope.id.clone()))
        });
        self.dead_letters.lock().await.push(DeadLetter {
            envelope,
            error: error.to_string(),
        });
        Err(CrateError::AgentRuntime(AgentRuntimeError::RetriesExhausted(error.to_string())))
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    pub async fn queue_depth(&self, agent_id: &str) -> usize {
        match self.mailbox_for(agent_id).await {
            Some(mailbox) => mailbox.depth().await,
            None => 0,
        }
    }
}
