//! Specialized agents (C6): planning, implementation, verification, review.
//!
//! All four share one `Agent` trait dispatched by trait object, following the
//! source's coordinator pattern of holding `Arc<dyn LlmClient>`/`Arc<dyn Generator>`
//! and calling through the trait rather than matching on concrete agent types.

pub mod dispatch;
pub mod implementation;
pub mod planning;
pub mod review;
pub mod verification;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use dispatch::{register_agent, TaskDispatcher};
pub use implementation::{Artifact, ImplementationAgent};
pub use planning::PlanningAgent;
pub use review::ReviewAgent;
pub use verification::VerificationAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    ExtractText,
    AnalyzeEffects,
    GenerateReplacements,
}

impl OperationKind {
    pub fn base_confidence(self) -> f64 {
        match self {
            OperationKind::ExtractText | OperationKind::AnalyzeEffects => 0.9,
            OperationKind::GenerateReplacements => 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: i64,
    pub composition_name: String,
    pub operation: OperationKind,
    pub confidence: f64,
    pub priority: u8,
    pub estimated_duration_secs: u64,
    pub depends_on: Vec<String>,
    /// The upstream artifact this task operates on, set by the orchestrator when it
    /// forwards an `ImplementationAgent` output into a verification/review task.
    /// `None` for planning and implementation tasks, which produce it rather than
    /// consume it.
    pub artifact: Option<Artifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub project_id: i64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub task_id: String,
    pub summary: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn handle(&self, task: Task) -> Result<AgentOutput>;
}
