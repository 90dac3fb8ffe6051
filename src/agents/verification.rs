//! Verification agent (C6): runs a generated test suite against an artifact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{Agent, AgentOutput, Task};

/// Below this coverage fraction, the result is `failed` regardless of pass/fail counts.
const COVERAGE_FLOOR: f64 = 0.80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub coverage: f64,
    pub failures: Vec<String>,
}

/// Runs a fixed test suite against an artifact and reports pass/fail plus coverage.
/// Production implementations generate and execute real tests; this trait is the seam.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, task: &Task) -> Result<(bool, f64, Vec<String>)>;
}

pub struct VerificationAgent {
    runner: std::sync::Arc<dyn TestRunner>,
}

impl VerificationAgent {
    pub fn new(runner: std::sync::Arc<dyn TestRunner>) -> Self {
        Self { runner }
    }

    fn apply_coverage_floor(mut passed: bool, coverage: f64) -> bool {
        if coverage < COVERAGE_FLOOR {
            passed = false;
        }
        passed
    }
}

#[async_trait]
impl Agent for VerificationAgent {
    async fn handle(&self, task: Task) -> Result<AgentOutput> {
        let (ran_passed, coverage, failures) = self.runner.run(&task).await?;
        let passed = Self::apply_coverage_floor(ran_passed, coverage);
        let result = VerificationResult {
            passed,
            coverage,
            failures,
        };
        Ok(AgentOutput {
            task_id: task.id,
            summary: format!("passed={passed} coverage={coverage:.2}"),
            data: serde_json::to_value(&result)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OperationKind;

    struct FixedRunner {
        passed: bool,
        coverage: f64,
    }

    #[async_trait]
    impl TestRunner for FixedRunner {
        async fn run(&self, _task: &Task) -> Result<(bool, f64, Vec<String>)> {
            Ok((self.passed, self.coverage, Vec::new()))
        }
    }

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
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
    async fn high_coverage_pass_stays_pass() {
        let agent = VerificationAgent::new(std::sync::Arc::new(FixedRunner { passed: true, coverage: 0.95 }));
        let output = agent.handle(sample_task()).await.unwrap();
        let result: VerificationResult = serde_json::from_value(output.data).unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn low_coverage_forces_failure_even_if_tests_passed() {
        let agent = VerificationAgent::new(std::sync::Arc::new(FixedRunner { passed: true, coverage: 0.5 }));
        let output = agent.handle(sample_task()).await.unwrap();
        let result: VerificationResult = serde_json::from_value(output.data).unwrap();
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn coverage_exactly_at_floor_passes() {
        let agent = VerificationAgent::new(std::sync::Arc::new(FixedRunner { passed: true, coverage: COVERAGE_FLOOR }));
        let output = agent.handle(sample_task()).await.unwrap();
        let result: VerificationResult = serde_json::from_value(output.data).unwrap();
        assert!(result.passed);
    }
}
