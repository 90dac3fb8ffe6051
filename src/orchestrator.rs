//! Meta-Orchestrator (C7): drives the workflow state machine across the C6 agents.
//!
//! Grounded on the source's `WorkflowEngine`/`SnapshotStorage` pair: an async
//! `SnapshotStorage` trait (`store_snapshot`/`get_snapshot`/`list_snapshots`/
//! `delete_snapshot`) and a decision-driven dispatch loop, adapted to the fixed stage
//! graph below rather than the source's free-form step graph. Checkpointing writes a
//! snapshot row after every transition, not only on suspend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use uuid::Uuid;

use crate::agent_runtime::MessageBus;
use crate::agents::{AgentOutput, Task, TaskDispatcher};
use crate::config::OrchestratorConfig;
use crate::error::{CrateError, OrchestratorError, Result};

/// Bus mailbox names the four C6 agents are registered under by `agents::register_agent`.
pub const PLANNING_AGENT_ID: &str = "planning";
pub const IMPLEMENTATION_AGENT_ID: &str = "implementation";
pub const VERIFICATION_AGENT_ID: &str = "verification";
pub const REVIEW_AGENT_ID: &str = "review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Created,
    Planning,
    Implementing,
    Verifying,
    Reviewing,
    AwaitingApproval,
    Complete,
    Failed,
}

/// Dispatch outcome for one transition attempt, mirroring the source's
/// `WorkflowDecision` (`Continue`/`Complete`/`Jump`/`Suspend`/`WaitForInput`) narrowed
/// to this crate's fixed stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Advance(Stage),
    AwaitApproval,
    Complete,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub stage: Stage,
    pub iteration_count: u32,
    pub stage_entry_counts: std::collections::HashMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    async fn store_snapshot(&self, snapshot: &WorkflowSnapshot) -> Result<()>;
    async fn get_latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>>;
    async fn list_snapshots(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSnapshot>>;
    async fn delete_snapshots(&self, workflow_id: Uuid) -> Result<usize>;
}

/// SQLite-backed `SnapshotStorage`, reusing the catalog store's connection pool.
pub struct SqliteSnapshotStorage {
    pool: SqlitePool,
}

impl SqliteSnapshotStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_snapshots (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                iteration_count INTEGER NOT NULL,
                stage_entry_counts TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_workflow ON workflow_snapshots(workflow_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for SqliteSnapshotStorage {
    async fn store_snapshot(&self, snapshot: &WorkflowSnapshot) -> Result<()> {
        let stage_json = serde_json::to_string(&snapshot.stage)?;
        let entry_counts_json = serde_json::to_string(&snapshot.stage_entry_counts)?;
        sqlx::query(
            "INSERT INTO workflow_snapshots (id, workflow_id, stage, iteration_count, stage_entry_counts, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.workflow_id.to_string())
        .bind(stage_json)
        .bind(snapshot.iteration_count)
        .bind(entry_counts_json)
        .bind(snapshot.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>> {
        let row = sqlx::query(
            "SELECT id, workflow_id, stage, iteration_count, stage_entry_counts, created_at FROM workflow_snapshots WHERE workflow_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_snapshot).transpose()
    }

    async fn list_snapshots(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSnapshot>> {
        let rows = sqlx::query(
            "SELECT id, workflow_id, stage, iteration_count, stage_entry_counts, created_at FROM workflow_snapshots WHERE workflow_id = ? ORDER BY created_at ASC",
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_snapshot).collect()
    }

    async fn delete_snapshots(&self, workflow_id: Uuid) -> Result<usize> {
        let result = sqlx::query("DELETE FROM workflow_snapshots WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

fn row_to_snapshot(row: sqlx::sqlite::SqliteRow) -> Result<WorkflowSnapshot> {
    let stage: Stage = serde_json::from_str(&row.get::<String, _>("stage"))?;
    let stage_entry_counts: std::collections::HashMap<String, u32> =
        serde_json::from_str(&row.get::<String, _>("stage_entry_counts"))?;
    Ok(WorkflowSnapshot {
        id: Uuid::parse_str(&row.get::<String, _>("id")).map_err(|e| CrateError::Config(e.to_string()))?,
        workflow_id: Uuid::parse_str(&row.get::<String, _>("workflow_id"))
            .map_err(|e| CrateError::Config(e.to_string()))?,
        stage,
        iteration_count: row.get::<i64, _>("iteration_count") as u32,
        stage_entry_counts,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Drives one workflow instance through `created → planning → implementing →
/// verifying → reviewing → awaiting_approval? → complete`, persisting a checkpoint
/// after every transition and failing on loop detection or exhausted retries.
pub struct WorkflowEngine<S: SnapshotStorage> {
    storage: S,
    config: OrchestratorConfig,
}

impl<S: SnapshotStorage> WorkflowEngine<S> {
    pub fn new(storage: S, config: OrchestratorConfig) -> Self {
        Self { storage, config }
    }

    pub async fn start(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        let snapshot = WorkflowSnapshot {
            id: Uuid::new_v4(),
            workflow_id,
            stage: Stage::Created,
            iteration_count: 0,
            stage_entry_counts: std::collections::HashMap::new(),
            created_at: Utc::now(),
        };
        self.storage.store_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Apply one stage transition, checking loop detection before persisting the new
    /// snapshot. `requires_approval` reflects whether the *current* stage's config
    /// gate is set; `awaiting_approval` is only entered when true.
    pub async fn transition(
        &self,
        current: &WorkflowSnapshot,
        decision: Decision,
    ) -> Result<WorkflowSnapshot> {
        let next_stage = match decision {
            Decision::Advance(stage) => stage,
            Decision::AwaitApproval => Stage::AwaitingApproval,
            Decision::Complete => Stage::Complete,
            Decision::Fail => Stage::Failed,
        };

        let stage_key = format!("{next_stage:?}");
        let mut stage_entry_counts = current.stage_entry_counts.clone();
        let count = stage_entry_counts.entry(stage_key.clone()).or_insert(0);
        *count += 1;

        if *count > self.config.loop_limit {
            return Err(CrateError::Orchestrator(OrchestratorError::LoopDetected {
                stage: stage_key,
                count: *count,
                limit: self.config.loop_limit,
            }));
        }

        let snapshot = WorkflowSnapshot {
            id: Uuid::new_v4(),
            workflow_id: current.workflow_id,
            stage: next_stage,
            iteration_count: current.iteration_count + 1,
            stage_entry_counts,
            created_at: Utc::now(),
        };
        self.storage.store_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Resume from the latest persisted snapshot, if any, for process-restart recovery.
    pub async fn resume(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>> {
        self.storage.get_latest(workflow_id).await
    }

    pub fn next_stage(current: Stage) -> Stage {
        match current {
            Stage::Created => Stage::Planning,
            Stage::Planning => Stage::Implementing,
            Stage::Implementing => Stage::Verifying,
            Stage::Verifying => Stage::Reviewing,
            Stage::Reviewing => Stage::Complete,
            other => other,
        }
    }
}

/// Wraps a `WorkflowEngine` with a `TaskDispatcher` so every stage advance actually
/// sends its `Task` through the message bus to the registered C6 agent, rather than
/// calling the agent directly. Callers never hold a reference to a concrete agent.
pub struct WorkflowRunner<S: SnapshotStorage> {
    engine: WorkflowEngine<S>,
    dispatcher: TaskDispatcher,
}

impl<S: SnapshotStorage> WorkflowRunner<S> {
    pub fn new(engine: WorkflowEngine<S>, bus: Arc<MessageBus>, inbox_id: impl Into<String>) -> Self {
        Self {
            engine,
            dispatcher: TaskDispatcher::new(bus, inbox_id),
        }
    }

    pub async fn start(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.engine.start(workflow_id).await
    }

    async fn run_stage(
        &self,
        snapshot: &WorkflowSnapshot,
        agent_id: &str,
        next_stage: Stage,
        task: Task,
    ) -> Result<(WorkflowSnapshot, AgentOutput)> {
        let output = self.dispatcher.dispatch(agent_id, task).await?;
        let snapshot = self.engine.transition(snapshot, Decision::Advance(next_stage)).await?;
        Ok((snapshot, output))
    }

    /// Created -> Planning: dispatches decomposition for one composition's task.
    pub async fn run_planning(&self, snapshot: &WorkflowSnapshot, task: Task) -> Result<(WorkflowSnapshot, AgentOutput)> {
        self.run_stage(snapshot, PLANNING_AGENT_ID, Stage::Planning, task).await
    }

    /// Planning -> Implementing: dispatches artifact generation for a planned task.
    pub async fn run_implementation(
        &self,
        snapshot: &WorkflowSnapshot,
        task: Task,
    ) -> Result<(WorkflowSnapshot, AgentOutput)> {
        self.run_stage(snapshot, IMPLEMENTATION_AGENT_ID, Stage::Implementing, task).await
    }

    /// Implementing -> Verifying: `task.artifact` must carry the implementation's output.
    pub async fn run_verification(
        &self,
        snapshot: &WorkflowSnapshot,
        task: Task,
    ) -> Result<(WorkflowSnapshot, AgentOutput)> {
        self.run_stage(snapshot, VERIFICATION_AGENT_ID, Stage::Verifying, task).await
    }

    /// Verifying -> Reviewing: `task.artifact` must carry the implementation's output.
    pub async fn run_review(&self, snapshot: &WorkflowSnapshot, task: Task) -> Result<(WorkflowSnapshot, AgentOutput)> {
        self.run_stage(snapshot, REVIEW_AGENT_ID, Stage::Reviewing, task).await
    }

    pub async fn complete(&self, snapshot: &WorkflowSnapshot) -> Result<WorkflowSnapshot> {
        self.engine.transition(snapshot, Decision::Complete).await
    }
}
