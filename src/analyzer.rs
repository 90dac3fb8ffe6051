//! Analyzer/Scorer (C4): derives automation-score, opportunities, categories, and tags
//! from a parsed `Project`.
//!
//! The weight constants below are the contract, not illustrative (§9 open question 3):
//! they are reproduced here exactly as named constants and never inlined.

use serde::{Deserialize, Serialize};

use crate::aep::{Composition, ItemKind, Project};

// complexity_score weights
const WEIGHT_COMPOSITION_COUNT: f64 = 2.0;
const WEIGHT_LAYER_COUNT: f64 = 0.5;
const WEIGHT_EFFECT_COUNT: f64 = 0.8;
const WEIGHT_MAX_NESTING: f64 = 3.0;
const WEIGHT_HAS_EXPRESSIONS: f64 = 10.0;
const COMPLEXITY_SCORE_CAP: f64 = 100.0;

// automation_score weights
const WEIGHT_TEXT_COMPLEXITY: f64 = 0.25;
const WEIGHT_MEDIA_COMPLEXITY: f64 = 0.20;
const WEIGHT_MODULARITY: f64 = 0.15;
const WEIGHT_EFFECT_COMPLEXITY: f64 = 0.10;
const WEIGHT_DATA_BINDING: f64 = 0.15;
const WEIGHT_API_READINESS: f64 = 0.10;
const WEIGHT_MAINTENANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Trivial,
    Moderate,
    Hard,
}

impl Difficulty {
    fn weight(self) -> f64 {
        match self {
            Difficulty::Trivial => 0.2,
            Difficulty::Moderate => 0.5,
            Difficulty::Hard => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    fn weight(self) -> f64 {
        match self {
            Impact::Low => 0.2,
            Impact::Medium => 0.5,
            Impact::High => 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub kind: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub impact: Impact,
    pub components: Vec<String>,
}

impl Opportunity {
    fn rank_weight(&self) -> f64 {
        self.impact.weight() - self.difficulty.weight()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub complexity_score: f64,
    pub automation_score: f64,
    pub opportunities: Vec<Opportunity>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Weighted inputs to `automation_score`, each already normalized to `[0, 1]` by the
/// caller before the fixed weights in this module are applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomationFactors {
    pub text_complexity: f64,
    pub media_complexity: f64,
    pub modularity: f64,
    pub effect_complexity: f64,
    pub data_binding: f64,
    pub api_readiness: f64,
    pub maintenance: f64,
}

pub fn complexity_score(project: &Project) -> f64 {
    let composition_count = project.compositions().count() as f64;
    let layer_count = project.total_layer_count() as f64;
    let effect_count = project.total_effect_count() as f64;
    let max_nesting = project.max_property_nesting() as f64;
    let has_expressions = if project.has_expressions() { 1.0 } else { 0.0 };

    let raw = composition_count * WEIGHT_COMPOSITION_COUNT
        + layer_count * WEIGHT_LAYER_COUNT
        + effect_count * WEIGHT_EFFECT_COUNT
        + max_nesting * WEIGHT_MAX_NESTING
        + has_expressions * WEIGHT_HAS_EXPRESSIONS;

    raw.min(COMPLEXITY_SCORE_CAP)
}

pub fn automation_score(factors: AutomationFactors) -> f64 {
    let score = factors.text_complexity * WEIGHT_TEXT_COMPLEXITY
        + factors.media_complexity * WEIGHT_MEDIA_COMPLEXITY
        + factors.modularity * WEIGHT_MODULARITY
        + factors.effect_complexity * WEIGHT_EFFECT_COMPLEXITY
        + factors.data_binding * WEIGHT_DATA_BINDING
        + factors.api_readiness * WEIGHT_API_READINESS
        + factors.maintenance * WEIGHT_MAINTENANCE;
    score.clamp(0.0, 1.0)
}

/// Derive automation factors from a parsed project using simple, explainable proxies.
fn derive_automation_factors(project: &Project) -> AutomationFactors {
    let text_layer_count = project
        .compositions()
        .flat_map(|(_, c)| c.layers.iter())
        .filter(|l| l.is_text_layer())
        .count();
    let total_layers = project.total_layer_count().max(1);
    let composition_count = project.compositions().count().max(1);

    AutomationFactors {
        text_complexity: (text_layer_count as f64 / total_layers as f64).min(1.0),
        media_complexity: (footage_count(project) as f64 / composition_count as f64).min(1.0),
        modularity: (composition_count as f64 / (composition_count as f64 + 1.0)).min(1.0),
        effect_complexity: (project.total_effect_count() as f64 / total_layers as f64).min(1.0),
        data_binding: if project.has_expressions() { 0.8 } else { 0.2 },
        api_readiness: if text_layer_count > 0 { 0.8 } else { 0.3 },
        maintenance: (1.0 - project.max_property_nesting() as f64 / 10.0).max(0.0),
    }
}

fn footage_count(project: &Project) -> usize {
    project
        .items
        .values()
        .filter(|item| matches!(item.kind, ItemKind::Footage(_)))
        .count()
}

fn categorize_resolution(width: u16, height: u16) -> Vec<String> {
    let mut cats = Vec::new();
    if width >= 3840 {
        cats.push("4K".to_string());
    } else if width >= 1920 {
        cats.push("HD".to_string());
    } else {
        cats.push("SD".to_string());
    }
    if width == height {
        cats.push("Square".to_string());
    } else if height > width {
        cats.push("Vertical".to_string());
    }
    cats
}

fn categorize_duration(duration_seconds: f64) -> &'static str {
    if duration_seconds < 5.0 {
        "short"
    } else if duration_seconds < 30.0 {
        "medium"
    } else {
        "long"
    }
}

fn derive_categories_and_tags(project: &Project) -> (Vec<String>, Vec<String>) {
    let mut categories = std::collections::BTreeSet::new();
    let mut tags = std::collections::BTreeSet::new();

    for (_, comp) in project.compositions() {
        for c in categorize_resolution(comp.width, comp.height) {
            categories.insert(c);
        }
        tags.insert(categorize_duration(comp.duration_seconds).to_string());
        if comp.layers.iter().any(|l| l.is_text_layer()) {
            tags.insert("text-layers".to_string());
        }
        if comp.layers.iter().any(|l| l.flags.three_d) {
            tags.insert("3d".to_string());
        }
    }
    if project.has_expressions() {
        tags.insert("expressions".to_string());
    }

    (categories.into_iter().collect(), tags.into_iter().collect())
}

fn derive_opportunities(project: &Project, factors: AutomationFactors) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    if factors.text_complexity > 0.0 {
        opportunities.push(Opportunity {
            kind: "text_replacement".to_string(),
            description: "Text layers detected; template text can be parameterized".to_string(),
            difficulty: Difficulty::Trivial,
            impact: Impact::High,
            components: vec!["text_layers".to_string()],
        });
    }
    if footage_count(project) > 0 {
        opportunities.push(Opportunity {
            kind: "media_swap".to_string(),
            description: "Placeholder/file footage can be swapped programmatically".to_string(),
            difficulty: Difficulty::Moderate,
            impact: Impact::Medium,
            components: vec!["media_assets".to_string()],
        });
    }
    if project.total_effect_count() > 0 {
        opportunities.push(Opportunity {
            kind: "effect_parameterization".to_string(),
            description: "Effects present; parameters could be exposed for automation"
                .to_string(),
            difficulty: Difficulty::Hard,
            impact: Impact::Medium,
            components: vec!["effects".to_string()],
        });
    }

    let mut indexed: Vec<(usize, Opportunity)> = opportunities.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| {
        b.1.rank_weight()
            .partial_cmp(&a.1.rank_weight())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    indexed.into_iter().map(|(_, o)| o).collect()
}

/// Run the full analysis pipeline over a parsed project.
pub fn analyze(project: &Project) -> AnalysisResult {
    let factors = derive_automation_factors(project);
    let (categories, tags) = derive_categories_and_tags(project);

    AnalysisResult {
        complexity_score: complexity_score(project),
        automation_score: automation_score(factors),
        opportunities: derive_opportunities(project, factors),
        categories,
        tags,
    }
}

#[allow(dead_code)]
fn assert_compositions_nonempty(comp: &Composition) -> bool {
    comp.width > 0 && comp.height > 0
}
