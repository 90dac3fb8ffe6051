//! Review agent (C6): static-analysis heuristics over a generated artifact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, CrateError, Result};

use super::{Agent, AgentOutput, Artifact, Task};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionScores {
    pub complexity: f64,
    pub duplication: f64,
    pub security: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub scores: DimensionScores,
    pub recommendations: Vec<String>,
}

fn score_complexity(content: &str) -> f64 {
    let lines = content.lines().count().max(1) as f64;
    (1.0 - (lines / 200.0)).clamp(0.0, 1.0)
}

fn score_duplication(content: &str) -> f64 {
    let lines: Vec<&str> = content.lines().collect();
    let unique: std::collections::HashSet<&str> = lines.iter().copied().collect();
    if lines.is_empty() {
        return 1.0;
    }
    unique.len() as f64 / lines.len() as f64
}

fn score_security(content: &str) -> f64 {
    const RISKY_MARKERS: &[&str] = &["unwrap()", "unsafe", "eval(", "exec("];
    let hits = RISKY_MARKERS.iter().filter(|m| content.contains(*m)).count();
    (1.0 - hits as f64 * 0.25).clamp(0.0, 1.0)
}

fn recommendations_for(scores: DimensionScores) -> Vec<String> {
    let mut out = Vec::new();
    if scores.complexity < 0.5 {
        out.push("consider splitting this artifact into smaller units".to_string());
    }
    if scores.duplication < 0.7 {
        out.push("repeated lines detected; consider extracting a helper".to_string());
    }
    if scores.security < 0.75 {
        out.push("risky constructs detected; review before merging".to_string());
    }
    out
}

pub struct ReviewAgent;

impl ReviewAgent {
    pub fn new() -> Self {
        Self
    }

    fn review(content: &str) -> ReviewResult {
        let scores = DimensionScores {
            complexity: score_complexity(content),
            duplication: score_duplication(content),
            security: score_security(content),
        };
        let recommendations = recommendations_for(scores);
        ReviewResult { scores, recommendations }
    }
}

impl Default for ReviewAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ReviewAgent {
    async fn handle(&self, task: Task) -> Result<AgentOutput> {
        let artifact = task.artifact.as_ref().ok_or_else(|| {
            CrateError::Analyzer(AnalyzerError::ValidationFailed {
                field: "artifact".to_string(),
                reason: format!("task {} has no artifact to review", task.id),
            })
        })?;
        let result = Self::review(&artifact.content);
        Ok(AgentOutput {
            task_id: task.id,
            summary: format!(
                "complexity={:.2} duplication={:.2} security={:.2}",
                result.scores.complexity, result.scores.duplication, result.scores.security
            ),
            data: serde_json::to_value(&result)?,
        })
    }
}
