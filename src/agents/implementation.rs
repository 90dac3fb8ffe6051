//! Implementation agent (C6): cascading artifact generation.
//!
//! Grounded directly on the source's `ProviderManager`: a primary generator plus an
//! ordered list of fallbacks, each attempt logged with `warn!` on failure before
//! advancing. The cascade is a policy, not a semantic — any generator producing a
//! validated artifact terminates it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

use super::{Agent, AgentOutput, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: String,
    pub content: String,
    pub generator_name: String,
}

/// One candidate code/plan generator in the cascade.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, task: &Task) -> Result<Artifact>;
}

pub struct ImplementationAgent {
    primary: Arc<dyn Generator>,
    fallbacks: Vec<Arc<dyn Generator>>,
}

impl ImplementationAgent {
    pub fn new(primary: Arc<dyn Generator>) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
        }
    }

    pub fn with_fallback(mut self, generator: Arc<dyn Generator>) -> Self {
        self.fallbacks.push(generator);
        self
    }

    async fn generate_with_cascade(&self, task: &Task) -> Result<Artifact> {
        let mut last_error = None;

        match self.primary.generate(task).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => {
                warn!(generator = self.primary.name(), error = %e, "generator failed, falling back");
                last_error = Some(e);
            }
        }

        for generator in &self.fallbacks {
            match generator.generate(task).await {
                Ok(artifact) => {
                    debug!(generator = generator.name(), "fallback generator succeeded");
                    return Ok(artifact);
                }
                Err(e) => {
                    warn!(generator = generator.name(), error = %e, "generator failed, falling back");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.expect("cascade always attempts at least the primary generator"))
    }
}

#[async_trait]
impl Agent for ImplementationAgent {
    async fn handle(&self, task: Task) -> Result<AgentOutput> {
        let artifact = self.generate_with_cascade(&task).await?;
        Ok(AgentOutput {
            task_id: task.id,
            summary: format!("generated {} via {}", artifact.kind, artifact.generator_name),
            data: serde_json::to_value(&artifact)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OperationKind;
    use crate::error::{AnalyzerError, CrateError};

    struct FailingGenerator;
    #[async_trait]
    impl Generator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }
        async fn generate(&self, _task: &Task) -> Result<Artifact> {
            Err(CrateError::Analyzer(AnalyzerError::ValidationFailed {
                field: "artifact".to_string(),
                reason: "always fails".to_string(),
            }))
        }
    }

    struct SucceedingGenerator;
    #[async_trait]
    impl Generator for SucceedingGenerator {
        fn name(&self) -> &str {
            "succeeding"
        }
        async fn generate(&self, task: &Task) -> Result<Artifact> {
            Ok(Artifact {
                kind: "text_replacement".to_string(),
                content: format!("plan for {}", task.id),
                generator_name: self.name().to_string(),
            })
        }
    }

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            project_id: 1,
            composition_name: "comp".to_string(),
            operation: OperationKind::GenerateReplacements,
            confidence: 0.9,
            priority: 10,
            estimated_duration_secs: 5,
            depends_on: Vec::new(),
            artifact: None,
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallbacks() {
        let agent = ImplementationAgent::new(Arc::new(SucceedingGenerator));
        let output = agent.handle(sample_task()).await.unwrap();
        assert!(output.summary.contains("succeeding"));
    }

    #[tokio::test]
    async fn falls_back_on_primary_failure() {
        let agent = ImplementationAgent::new(Arc::new(FailingGenerator)).with_fallback(Arc::new(SucceedingGenerator));
        let output = agent.handle(sample_task()).await.unwrap();
        assert!(output.summary.contains("succeeding"));
    }

    #[tokio::test]
    async fn exhausted_cascade_returns_last_error() {
        let agent = ImplementationAgent::new(Arc::new(FailingGenerator)).with_fallback(Arc::new(FailingGenerator));
        let result = agent.handle(sample_task()).await;
        assert!(result.is_err());
    }
}
