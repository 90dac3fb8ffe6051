//! Wires the specialized agents (C6) onto the message bus (C5) so the orchestrator
//! (C7) never calls an agent's `handle` directly, only ever through `MessageBus::send`
//! and `MessageBus::receive`, per the bus-only-callers rule.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::agent_runtime::{AgentLifecycle, CancellationToken, Envelope, MessageBus, MessageKind};
use crate::error::{AgentRuntimeError, CrateError, Result};

use super::{Agent, AgentOutput, Task};

/// Start a worker loop that pulls `Task`-shaped envelopes addressed to `agent_id`,
/// runs them through `agent`, and replies to the sender with the `AgentOutput` (or an
/// error subject) on the same bus.
pub async fn register_agent(
    lifecycle: &AgentLifecycle,
    bus: Arc<MessageBus>,
    agent_id: &str,
    agent: Arc<dyn Agent>,
) {
    lifecycle
        .start(agent_id, move |envelope| {
            let agent = agent.clone();
            let bus = bus.clone();
            async move {
                let reply_to = envelope.metadata.reply_to.clone().unwrap_or_else(|| envelope.from.clone());
                let correlation_id = envelope.metadata.correlation_id.clone();

                let task: Task = match serde_json::from_value(envelope.payload) {
                    Ok(task) => task,
                    Err(e) => {
                        warn!(error = %e, "dropping envelope with an undecodable task payload");
                        return;
                    }
                };

                let response = match agent.handle(task).await {
                    Ok(output) => Envelope::new(envelope.to, reply_to, "agent-output", serde_json::to_value(&output).unwrap_or(Value::Null))
                        .with_kind(MessageKind::Response)
                        .with_correlation_id(correlation_id),
                    Err(e) => Envelope::new(envelope.to, reply_to, "agent-error", Value::String(e.to_string()))
                        .with_kind(MessageKind::Response)
                        .with_correlation_id(correlation_id),
                };

                if let Err(e) = bus.send(response).await {
                    warn!(error = %e, "failed to send agent response back onto the bus");
                }
            }
        })
        .await;
}

/// Sends a `Task` to a registered agent and blocks until the correlated response
/// arrives on this dispatcher's own inbox mailbox.
pub struct TaskDispatcher {
    bus: Arc<MessageBus>,
    inbox_id: String,
}

impl TaskDispatcher {
    pub fn new(bus: Arc<MessageBus>, inbox_id: impl Into<String>) -> Self {
        Self { bus, inbox_id: inbox_id.into() }
    }

    pub async fn dispatch(&self, agent_id: &str, task: Task) -> Result<AgentOutput> {
        let correlation_id = task.id.clone();
        let envelope = Envelope::new(self.inbox_id.clone(), agent_id, "task", serde_json::to_value(&task)?)
            .with_kind(MessageKind::Request)
            .with_correlation_id(correlation_id.clone());
        self.bus.send(envelope).await?;

        let token = CancellationToken::new();
        loop {
            let response = self.bus.receive(&self.inbox_id, &token).await.ok_or_else(|| {
                CrateError::AgentRuntime(AgentRuntimeError::Timeout {
                    operation: format!("dispatch to {agent_id}"),
                    elapsed_ms: 0,
                })
            })?;
            if response.metadata.correlation_id != correlation_id {
                // Not the reply this call is waiting on; this dispatcher owns its inbox
                // exclusively, so this only happens if a caller mixes dispatchers.
                warn!(expected = %correlation_id, got = %response.metadata.correlation_id, "dropping unrelated reply");
                continue;
            }
            return match response.subject.as_str() {
                "agent-error" => {
                    let message = response.payload.as_str().unwrap_or("agent error").to_string();
                    Err(CrateError::AgentRuntime(AgentRuntimeError::RetriesExhausted(message)))
                }
                _ => Ok(serde_json::from_value(response.payload)?),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OperationKind;
    use crate::config::AgentRuntimeConfig;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        async fn handle(&self, task: Task) -> Result<AgentOutput> {
            Ok(AgentOutput {
                task_id: task.id,
                summary: "echoed".to_string(),
                data: Value::Null,
            })
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        async fn handle(&self, task: Task) -> Result<AgentOutput> {
            Err(CrateError::AgentRuntime(AgentRuntimeError::Timeout {
                operation: task.id,
                elapsed_ms: 1,
            }))
        }
    }

    fn sample_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            project_id: 1,
            composition_name: "comp".to_string(),
            operation: OperationKind::ExtractText,
            confidence: 0.9,
            priority: 10,
            estimated_duration_secs: 5,
            depends_on: Vec::new(),
            artifact: None,
        }
    }

    #[tokio::test]
    async fn dispatch_round_trips_through_the_bus() {
        let bus = Arc::new(MessageBus::new(AgentRuntimeConfig::default()));
        let lifecycle = AgentLifecycle::new(bus.clone());
        register_agent(&lifecycle, bus.clone(), "echo", Arc::new(EchoAgent)).await;

        let dispatcher = TaskDispatcher::new(bus.clone(), "orchestrator");
        let output = dispatcher.dispatch("echo", sample_task("t1")).await.unwrap();
        assert_eq!(output.task_id, "t1");
        assert_eq!(output.summary, "echoed");

        lifecycle.stop("echo", std::time::Duration::from_millis(500)).await;
    }

    #[tokio::test]
    async fn dispatch_surfaces_agent_errors() {
        let bus = Arc::new(MessageBus::new(AgentRuntimeConfig::default()));
        let lifecycle = AgentLifecycle::new(bus.clone());
        register_agent(&lifecycle, bus.clone(), "failing", Arc::new(FailingAgent)).await;

        let dispatcher = TaskDispatcher::new(bus.clone(), "orchestrator");
        let result = dispatcher.dispatch("failing", sample_task("t2")).await;
        assert!(result.is_err());

        lifecycle.stop("failing", std::time::Duration::from_millis(500)).await;
    }
}
