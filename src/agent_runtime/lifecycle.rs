//! Agent registration and lifecycle (register/start/stop/health-check).
//!
//! Grounded on the source's `Agent`/`AgentBuilder` lifecycle (`new`, `stats`,
//! `start_a2a`/`stop_a2a`) but generalized to trait-object agents dispatched by the
//! runtime rather than one concrete LLM-backed `Agent` type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::bus::{CancellationToken, MessageBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentHealth {
    Starting,
    Healthy,
    Stopped,
    Errored,
}

struct RunningAgent {
    token: CancellationToken,
    handle: JoinHandle<()>,
    started_at: Instant,
    health: AgentHealth,
}

/// Starts and stops long-lived worker tasks that pull from a `MessageBus` mailbox and
/// dispatch to a registered handler, one worker loop per agent kind.
pub struct AgentLifecycle {
    bus: Arc<MessageBus>,
    running: RwLock<HashMap<String, RunningAgent>>,
}

impl AgentLifecycle {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Start a worker loop for `agent_id` that calls `on_message` for every envelope
    /// received until canceled.
    pub async fn start<F, Fut>(&self, agent_id: &str, on_message: F)
    where
        F: Fn(crate::agent_runtime::message::Envelope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        self.bus.register(agent_id).await;
        let token = CancellationToken::new();
        let bus = self.bus.clone();
        let worker_token = token.clone();
        let agent_id_owned = agent_id.to_string();

        let handle = tokio::spawn(async move {
            loop {
                match bus.receive(&agent_id_owned, &worker_token).await {
                    Some(envelope) => on_message(envelope).await,
                    None => break,
                }
            }
        });

        self.running.write().await.insert(
            agent_id.to_string(),
            RunningAgent {
                token,
                handle,
                started_at: Instant::now(),
                health: AgentHealth::Healthy,
            },
        );
        info!(agent_id, "agent started");
    }

    /// Signal cancellation and await the worker task up to the grace window; a task
    /// that does not finish in time is abandoned (its result discarded).
    pub async fn stop(&self, agent_id: &str, grace: std::time::Duration) {
        let removed = self.running.write().await.remove(agent_id);
        let Some(mut agent) = removed else { return };
        agent.token.cancel();

        match tokio::time::timeout(grace, &mut agent.handle).await {
            Ok(_) => info!(agent_id, "agent stopped cleanly"),
            Err(_) => {
                agent.handle.abort();
                warn!(agent_id, "agent exceeded grace window, aborted");
            }
        }
    }

    pub async fn health(&self, agent_id: &str) -> AgentHealth {
        match self.running.read().await.get(agent_id) {
            Some(agent) if agent.handle.is_finished() => AgentHealth::Errored,
            Some(agent) => agent.health,
            None => AgentHealth::Stopped,
        }
    }

    pub async fn uptime(&self, agent_id: &str) -> Option<std::time::Duration> {
        self.running.read().await.get(agent_id).map(|a| a.started_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_runtime::message::Envelope;
    use crate::config::AgentRuntimeConfig;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let bus = Arc::new(MessageBus::new(AgentRuntimeConfig::default()));
        let lifecycle = AgentLifecycle::new(bus.clone());
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();

        lifecycle
            .start("worker", move |_env| {
                let received = received_clone.clone();
                async move {
                    received.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(lifecycle.health("worker").await, AgentHealth::Healthy);
        bus.send(Envelope::new("planner", "worker", "task", Value::Null)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);

        lifecycle.stop("worker", std::time::Duration::from_millis(500)).await;
        assert_eq!(lifecycle.health("worker").await, AgentHealth::Stopped);
    }

    #[tokio::test]
    async fn unknown_agent_reports_stopped() {
        let bus = Arc::new(MessageBus::new(AgentRuntimeConfig::default()));
        let lifecycle = AgentLifecycle::new(bus);
        assert_eq!(lifecycle.health("ghost").await, AgentHealth::Stopped);
    }
}
