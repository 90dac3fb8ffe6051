//! Error handling for the AEP catalog and orchestration crate.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CrateError>;

/// Top-level error kind. Every public operation returns exactly one of these
/// variants plus a message, per the error-kind taxonomy.
#[derive(Error, Debug)]
pub enum CrateError {
    #[error("RIFX reader error: {0}")]
    Rifx(#[from] RifxError),

    #[error("AEP parser error: {0}")]
    Aep(#[from] AepError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("agent runtime error: {0}")]
    AgentRuntime(#[from] AgentRuntimeError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by the RIFX reader (C1). Both variants are fatal for the document.
#[derive(Error, Debug)]
pub enum RifxError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("truncated stream: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("declared block size {size} exceeds remaining stream ({remaining} bytes)")]
    SizeOverflow { size: u64, remaining: u64 },
}

/// Errors raised by the AEP parser (C2). `UnknownChunk` is recoverable (the chunk is
/// preserved as opaque); the others are fatal for the document.
#[derive(Error, Debug)]
pub enum AepError {
    #[error("unknown chunk type {0}")]
    UnknownChunk(String),

    #[error("malformed top-level header")]
    MalformedHeader,

    #[error("truncated nested block at offset {0}")]
    Truncated(u64),

    #[error("dangling reference: item id {0} not present in project map")]
    DanglingReference(u32),
}

/// Errors raised by the catalog store (C3).
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("conflicting concurrent write for file_path {0}")]
    Conflict(String),

    #[error("project not found: {0}")]
    NotFound(String),

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
}

/// Errors raised by the analyzer/scorer (C4) and by agents (C6).
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("validation failed on field {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

/// Errors raised by the agent runtime message bus (C5).
#[derive(Error, Debug)]
pub enum AgentRuntimeError {
    #[error("queue full for agent {0}")]
    QueueFull(String),

    #[error("timeout waiting on {operation} after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("message delivery exhausted retries: {0}")]
    RetriesExhausted(String),
}

/// Errors raised by the meta-orchestrator (C7).
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("loop detected: stage {stage} re-entered {count} times (limit {limit})")]
    LoopDetected {
        stage: String,
        count: u32,
        limit: u32,
    },

    #[error("dependency failed: task {task_id} blocked by {dependency_id}")]
    DependencyFailed { task_id: String, dependency_id: String },

    #[error("approval timed out for workflow {0}")]
    ApprovalTimeout(String),
}

impl CrateError {
    /// Whether the caller should retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrateError::AgentRuntime(AgentRuntimeError::QueueFull(_))
                | CrateError::AgentRuntime(AgentRuntimeError::Timeout { .. })
                | CrateError::Catalog(CatalogError::Conflict(_))
        )
    }

    /// Stable category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            CrateError::Rifx(_) => "rifx",
            CrateError::Aep(_) => "aep",
            CrateError::Catalog(_) => "catalog",
            CrateError::Analyzer(_) => "analyzer",
            CrateError::AgentRuntime(_) => "agent_runtime",
            CrateError::Orchestrator(_) => "orchestrator",
            CrateError::Config(_) => "config",
            CrateError::Io(_) => "io",
            CrateError::Serialization(_) => "serialization",
            CrateError::Database(_) => "database",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let queue_full = CrateError::AgentRuntime(AgentRuntimeError::QueueFull("planning".into()));
        assert!(queue_full.is_retryable());

        let config_error = CrateError::Config("invalid config".to_string());
        assert!(!config_error.is_retryable());
    }

    #[test]
    fn test_error_category() {
        let loop_err = CrateError::Orchestrator(OrchestratorError::LoopDetected {
            stage: "verifying".into(),
            count: 51,
            limit: 50,
        });
        assert_eq!(loop_err.category(), "orchestrator");

        let catalog_err = CrateError::Catalog(CatalogError::NotFound("abc".into()));
        assert_eq!(catalog_err.category(), "catalog");
    }
}
