//! Planning agent (C6): decomposes a parsed project into a `TaskPlan` DAG.

use async_trait::async_trait;

use crate::aep::Project;
use crate::error::Result;

use super::{Agent, AgentOutput, OperationKind, Task, TaskPlan};

const REUSE_FACTOR_MIN: f64 = 0.5;
const REUSE_FACTOR_MAX: f64 = 1.5;
/// Number of similar historical tasks at which `reuse_factor` saturates at its max.
const REUSE_SATURATION_COUNT: usize = 5;

/// Historical task counts, consulted to compute `reuse_factor`. Backed by the catalog
/// store in production; a fixed-count stub is used in tests.
#[async_trait]
pub trait TaskHistory: Send + Sync {
    async fn similar_task_count(&self, operation: OperationKind) -> Result<usize>;
}

pub struct PlanningAgent {
    history: std::sync::Arc<dyn TaskHistory>,
}

impl PlanningAgent {
    pub fn new(history: std::sync::Arc<dyn TaskHistory>) -> Self {
        Self { history }
    }

    fn reuse_factor(similar_count: usize) -> f64 {
        let ratio = (similar_count.min(REUSE_SATURATION_COUNT) as f64) / REUSE_SATURATION_COUNT as f64;
        REUSE_FACTOR_MIN + ratio * (REUSE_FACTOR_MAX - REUSE_FACTOR_MIN)
    }

    fn confidence(operation: OperationKind, similar_count: usize) -> f64 {
        (operation.base_confidence() * Self::reuse_factor(similar_count)).min(1.0)
    }

    /// Decompose every composition into one task per operation kind, with
    /// `generate_replacements` depending on the other two for the same composition.
    pub async fn plan(&self, project_id: i64, project: &Project) -> Result<TaskPlan> {
        const OPERATIONS: [OperationKind; 3] = [
            OperationKind::ExtractText,
            OperationKind::AnalyzeEffects,
            OperationKind::GenerateReplacements,
        ];

        let mut tasks = Vec::new();
        let mut compositions: Vec<(&u32, &crate::aep::Composition)> = project.compositions().collect();
        compositions.sort_by_key(|(id, _)| **id);

        for (comp_id, comp) in compositions {
            let mut ids_for_comp: Vec<String> = Vec::new();
            for operation in OPERATIONS {
                let similar_count = self.history.similar_task_count(operation).await?;
                let confidence = Self::confidence(operation, similar_count);
                let id = format!("{project_id}-{comp_id}-{operation:?}");
                let depends_on = if operation == OperationKind::GenerateReplacements {
                    ids_for_comp.clone()
                } else {
                    Vec::new()
                };
                tasks.push(Task {
                    id: id.clone(),
                    project_id,
                    composition_name: format!("composition-{comp_id}"),
                    operation,
                    confidence,
                    priority: priority_for(comp.layers.len(), confidence),
                    estimated_duration_secs: estimated_duration(comp.layers.len(), operation),
                    depends_on,
                    artifact: None,
                });
                ids_for_comp.push(id);
            }
        }

        Ok(TaskPlan { project_id, tasks })
    }
}

fn priority_for(layer_count: usize, confidence: f64) -> u8 {
    let urgency = (layer_count as f64).min(50.0) / 50.0;
    (((1.0 - confidence) * 0.5 + urgency * 0.5) * 100.0) as u8
}

fn estimated_duration(layer_count: usize, operation: OperationKind) -> u64 {
    let base = match operation {
        OperationKind::ExtractText => 5,
        OperationKind::AnalyzeEffects => 10,
        OperationKind::GenerateReplacements => 20,
    };
    base + layer_count as u64 * 2
}

#[async_trait]
impl Agent for PlanningAgent {
    /// Recompute confidence for a single already-decomposed task, consulting the
    /// historical store for its current `reuse_factor`.
    async fn handle(&self, task: Task) -> Result<AgentOutput> {
        let similar_count = self.history.similar_task_count(task.operation).await?;
        let confidence = Self::confidence(task.operation, similar_count);
        Ok(AgentOutput {
            task_id: task.id,
            summary: format!("recomputed confidence {confidence:.3}"),
            data: serde_json::json!({ "confidence": confidence }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aep::{BitDepth, Composition, Item, ItemKind, Layer, LayerFlags, Project, Quality, Sampling};
    use std::collections::HashMap;

    struct FixedHistory(usize);

    #[async_trait]
    impl TaskHistory for FixedHistory {
        async fn similar_task_count(&self, _operation: OperationKind) -> Result<usize> {
            Ok(self.0)
        }
    }

    fn layer(name: &str) -> Layer {
        Layer {
            index: 1,
            name: name.to_string(),
            source_item_id: 0,
            quality: Quality::Best,
            sampling: Sampling::Bilinear,
            flags: LayerFlags::default(),
            properties: Vec::new(),
            text: None,
        }
    }

    fn project_with_one_composition(layer_count: usize) -> Project {
        let mut items = HashMap::new();
        items.insert(
            1,
            Item {
                id: 1,
                name: "comp".to_string(),
                kind: ItemKind::Composition(Composition {
                    width: 1920,
                    height: 1080,
                    frame_rate: 24.0,
                    duration_seconds: 5.0,
                    background_color: (0, 0, 0),
                    layers: (0..layer_count).map(|i| layer(&format!("layer{i}"))).collect(),
                }),
            },
        );
        Project {
            bit_depth: BitDepth::Eight,
            expression_engine: String::new(),
            items,
            root_item_id: Some(1),
            fingerprint: "fp".to_string(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn plans_one_task_per_operation_per_composition() {
        let agent = PlanningAgent::new(std::sync::Arc::new(FixedHistory(0)));
        let project = project_with_one_composition(3);
        let plan = agent.plan(1, &project).await.unwrap();
        assert_eq!(plan.tasks.len(), 3);
    }

    #[tokio::test]
    async fn generate_replacements_depends_on_the_other_two() {
        let agent = PlanningAgent::new(std::sync::Arc::new(FixedHistory(0)));
        let project = project_with_one_composition(1);
        let plan = agent.plan(1, &project).await.unwrap();
        let gen_task = plan
            .tasks
            .iter()
            .find(|t| t.operation == OperationKind::GenerateReplacements)
            .unwrap();
        assert_eq!(gen_task.depends_on.len(), 2);
    }

    #[tokio::test]
    async fn more_history_increases_confidence() {
        let low = PlanningAgent::new(std::sync::Arc::new(FixedHistory(0)));
        let high = PlanningAgent::new(std::sync::Arc::new(FixedHistory(5)));
        let project = project_with_one_composition(1);
        let low_plan = low.plan(1, &project).await.unwrap();
        let high_plan = high.plan(1, &project).await.unwrap();
        assert!(high_plan.tasks[0].confidence > low_plan.tasks[0].confidence);
    }

    #[tokio::test]
    async fn confidence_never_exceeds_one() {
        let agent = PlanningAgent::new(std::sync::Arc::new(FixedHistory(100)));
        let project = project_with_one_composition(1);
        let plan = agent.plan(1, &project).await.unwrap();
        assert!(plan.tasks.iter().all(|t| t.confidence <= 1.0));
    }
}
