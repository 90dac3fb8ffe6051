//! Catalog store (C3): transactional project persistence, search, filtering, and
//! similarity scoring, backed by `sqlx`'s SQLite driver.
//!
//! Grounded on the source's `SqliteMemoryStore`: a struct wrapping `SqlitePool`, manual
//! DDL run on `initialize()`, `sqlx::query(...).bind(...).execute(pool)` statements, and
//! `row.get("column")` extraction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::instrument;

use crate::aep::{FootageKind, ItemKind, Project};
use crate::analyzer::{AnalysisResult, Opportunity};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CrateError, Result};

use super::schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSummary {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub frame_rate: f64,
    pub duration_seconds: f64,
    pub layer_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLayerSummary {
    pub composition_name: String,
    pub layer_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAssetSummary {
    pub name: String,
    pub footage_kind: String,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSummary {
    pub name: String,
    pub layer_name: String,
}

/// Input to `store_project`: everything needed to persist one parsed/analyzed project.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub project: Project,
    pub analysis: AnalysisResult,
}

/// The full catalog record as returned by `get_project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub project_fingerprint: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub parsed_at: DateTime<Utc>,
    pub compositions: Vec<CompositionSummary>,
    pub text_layers: Vec<TextLayerSummary>,
    pub media_assets: Vec<MediaAssetSummary>,
    pub effects: Vec<EffectSummary>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub opportunities: Vec<Opportunity>,
    pub score_breakdown: AnalysisResult,
    pub search_blob: String,
}

#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub complexity_min: Option<f64>,
    pub complexity_max: Option<f64>,
    pub resolution_bucket: Option<String>,
    pub duration_bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResult {
    pub project_id: i64,
    pub score: f64,
    pub explanation: String,
}

const STOP_WORDS: &[&str] = &["a", "an", "the", "of", "and", "or", "in", "on", "for"];

pub struct CatalogStore {
    pool: SqlitePool,
    config: CatalogConfig,
}

impl CatalogStore {
    pub async fn connect(config: CatalogConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        schema::run_migrations(&pool).await?;
        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomically insert (or upsert, keyed on `file_path`) a project and all of its
    /// derived child rows.
    #[instrument(skip(self, metadata))]
    pub async fn store_project(&self, metadata: ProjectMetadata) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let parsed_at = Utc::now();
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM projects WHERE file_path = ?")
                .bind(&metadata.file_path)
                .fetch_optional(&mut *tx)
                .await?;

        let project_id = if let Some((id,)) = existing {
            sqlx::query(
                "UPDATE projects SET file_name = ?, file_size = ?, fingerprint = ?, bit_depth = ?, expression_engine = ?, parsed_at = ? WHERE id = ?",
            )
            .bind(&metadata.file_name)
            .bind(metadata.file_size as i64)
            .bind(&metadata.project.fingerprint)
            .bind(metadata.project.bit_depth.as_u8() as i64)
            .bind(&metadata.project.expression_engine)
            .bind(parsed_at.to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await?;
            for table in [
                "compositions",
                "text_layers",
                "media_assets",
                "effects",
                "project_categories",
                "project_tags",
                "opportunities",
                "analysis_results",
                "search_index",
            ] {
                sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?"))
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            id
        } else {
            let result = sqlx::query(
                "INSERT INTO projects (file_path, file_name, file_size, fingerprint, bit_depth, expression_engine, parsed_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&metadata.file_path)
            .bind(&metadata.file_name)
            .bind(metadata.file_size as i64)
            .bind(&metadata.project.fingerprint)
            .bind(metadata.project.bit_depth.as_u8() as i64)
            .bind(&metadata.project.expression_engine)
            .bind(parsed_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    CrateError::Catalog(CatalogError::Conflict(metadata.file_path.clone()))
                }
                _ => CrateError::Database(e),
            })?;
            result.last_insert_rowid()
        };

        let mut search_terms: Vec<String> = Vec::new();

        for (_, comp) in metadata.project.compositions() {
            sqlx::query(
                "INSERT INTO compositions (project_id, name, width, height, frame_rate, duration_seconds, layer_count) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(project_id)
            .bind("composition")
            .bind(comp.width as i64)
            .bind(comp.height as i64)
            .bind(comp.frame_rate)
            .bind(comp.duration_seconds)
            .bind(comp.layers.len() as i64)
            .execute(&mut *tx)
            .await?;

            for layer in &comp.layers {
                search_terms.push(layer.name.clone());
                if let Some(text) = &layer.text {
                    sqlx::query(
                        "INSERT INTO text_layers (project_id, composition_name, layer_name, text) VALUES (?, ?, ?, ?)",
                    )
                    .bind(project_id)
                    .bind("composition")
                    .bind(&layer.name)
                    .bind(&text.text)
                    .execute(&mut *tx)
                    .await?;
                    search_terms.push(text.text.clone());
                }

                for effect_name in effect_names(&layer.properties) {
                    sqlx::query(
                        "INSERT INTO effects (project_id, name, layer_name) VALUES (?, ?, ?)",
                    )
                    .bind(project_id)
                    .bind(&effect_name)
                    .bind(&layer.name)
                    .execute(&mut *tx)
                    .await?;
                    search_terms.push(effect_name);
                }
            }
        }

        for item in metadata.project.items.values() {
            if let ItemKind::Footage(footage) = &item.kind {
                let kind_str = match footage.footage_kind {
                    FootageKind::Solid => "solid",
                    FootageKind::Placeholder => "placeholder",
                    FootageKind::File => "file",
                    FootageKind::Other => "other",
                };
                sqlx::query(
                    "INSERT INTO media_assets (project_id, name, footage_kind, width, height) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(project_id)
                .bind(&item.name)
                .bind(kind_str)
                .bind(footage.width as i64)
                .bind(footage.height as i64)
                .execute(&mut *tx)
                .await?;
                search_terms.push(item.name.clone());
            }
        }

        for (rank, opp) in metadata.analysis.opportunities.iter().enumerate() {
            let components_json = serde_json::to_string(&opp.components)?;
            sqlx::query(
                "INSERT INTO opportunities (project_id, kind, description, difficulty, impact, components, rank) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(project_id)
            .bind(&opp.kind)
            .bind(&opp.description)
            .bind(format!("{:?}", opp.difficulty))
            .bind(format!("{:?}", opp.impact))
            .bind(components_json)
            .bind(rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        for category in &metadata.analysis.categories {
            sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
                .bind(category)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO project_categories (project_id, category_id) SELECT ?, id FROM categories WHERE name = ?",
            )
            .bind(project_id)
            .bind(category)
            .execute(&mut *tx)
            .await?;
            search_terms.push(category.clone());
        }

        for tag in &metadata.analysis.tags {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO project_tags (project_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
            )
            .bind(project_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
            search_terms.push(tag.clone());
        }

        let analysis_json = serde_json::to_string(&metadata.analysis)?;
        sqlx::query(
            "INSERT INTO analysis_results (project_id, complexity_score, automation_score, analysis_data) VALUES (?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(metadata.analysis.complexity_score)
        .bind(metadata.analysis.automation_score)
        .bind(analysis_json)
        .execute(&mut *tx)
        .await?;

        search_terms.push(metadata.file_name.clone());
        let search_blob = search_terms.join(" ").to_lowercase();
        sqlx::query("INSERT INTO search_index (project_id, blob) VALUES (?, ?)")
            .bind(project_id)
            .bind(&search_blob)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(project_id)
    }

    #[instrument(skip(self))]
    pub async fn get_project(&self, id: i64) -> Result<CatalogRecord> {
        let project_row = sqlx::query(
            "SELECT id, file_path, file_name, file_size, fingerprint, parsed_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CrateError::Catalog(CatalogError::NotFound(id.to_string())))?;

        let compositions: Vec<CompositionSummary> = sqlx::query(
            "SELECT name, width, height, frame_rate, duration_seconds, layer_count FROM compositions WHERE project_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| CompositionSummary {
            name: row.get("name"),
            width: row.get::<i64, _>("width") as u16,
            height: row.get::<i64, _>("height") as u16,
            frame_rate: row.get("frame_rate"),
            duration_seconds: row.get("duration_seconds"),
            layer_count: row.get::<i64, _>("layer_count") as usize,
        })
        .collect();

        let text_layers: Vec<TextLayerSummary> = sqlx::query(
            "SELECT composition_name, layer_name, text FROM text_layers WHERE project_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| TextLayerSummary {
            composition_name: row.get("composition_name"),
            layer_name: row.get("layer_name"),
            text: row.get("text"),
        })
        .collect();

        let media_assets: Vec<MediaAssetSummary> = sqlx::query(
            "SELECT name, footage_kind, width, height FROM media_assets WHERE project_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| MediaAssetSummary {
            name: row.get("name"),
            footage_kind: row.get("footage_kind"),
            width: row.get::<i64, _>("width") as u16,
            height: row.get::<i64, _>("height") as u16,
        })
        .collect();

        let effects: Vec<EffectSummary> =
            sqlx::query("SELECT name, layer_name FROM effects WHERE project_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| EffectSummary {
                    name: row.get("name"),
                    layer_name: row.get("layer_name"),
                })
                .collect();

        let tags: Vec<String> = sqlx::query(
            "SELECT t.name FROM tags t JOIN project_tags pt ON pt.tag_id = t.id WHERE pt.project_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get("name"))
        .collect();

        let categories: Vec<String> = sqlx::query(
            "SELECT c.name FROM categories c JOIN project_categories pc ON pc.category_id = c.id WHERE pc.project_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get("name"))
        .collect();

        let opportunity_rows = sqlx::query(
            "SELECT kind, description, difficulty, impact, components FROM opportunities WHERE project_id = ? ORDER BY rank ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let opportunities: Vec<Opportunity> = opportunity_rows
            .into_iter()
            .map(|row| {
                let components: Vec<String> =
                    serde_json::from_str(&row.get::<String, _>("components")).unwrap_or_default();
                Opportunity {
                    kind: row.get("kind"),
                    description: row.get("description"),
                    difficulty: parse_difficulty(&row.get::<String, _>("difficulty")),
                    impact: parse_impact(&row.get::<String, _>("impact")),
                    components,
                }
            })
            .collect();

        let analysis_row =
            sqlx::query("SELECT analysis_data FROM analysis_results WHERE project_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        let score_breakdown: AnalysisResult =
            serde_json::from_str(&analysis_row.get::<String, _>("analysis_data"))?;

        let search_row = sqlx::query("SELECT blob FROM search_index WHERE project_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(CatalogRecord {
            id: project_row.get("id"),
            project_fingerprint: project_row.get("fingerprint"),
            file_path: project_row.get("file_path"),
            file_name: project_row.get("file_name"),
            file_size: project_row.get::<i64, _>("file_size") as u64,
            parsed_at: DateTime::parse_from_rfc3339(&project_row.get::<String, _>("parsed_at"))
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            compositions,
            text_layers,
            media_assets,
            effects,
            tags,
            categories,
            opportunities,
            score_breakdown,
            search_blob: search_row.get("blob"),
        })
    }

    /// Tokenize `query`, strip stop-words, and return projects whose search blob
    /// contains every remaining term, ordered by parse recency then id ascending.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<i64>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| !STOP_WORDS.contains(&t.as_str()))
            .collect();

        let rows = sqlx::query(
            "SELECT p.id as id, s.blob as blob, p.parsed_at as parsed_at FROM projects p JOIN search_index s ON s.project_id = p.id ORDER BY p.parsed_at DESC, p.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let limit = limit.unwrap_or(self.config.default_limit);
        let mut results = Vec::new();
        for row in rows {
            let blob: String = row.get("blob");
            if terms.iter().all(|t| blob.contains(t.as_str())) {
                results.push(row.get::<i64, _>("id"));
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Composable predicate filter, parameterized (never string-concatenated).
    #[instrument(skip(self))]
    pub async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<i64>> {
        let mut sql = String::from(
            "SELECT DISTINCT p.id FROM projects p LEFT JOIN analysis_results a ON a.project_id = p.id WHERE 1=1",
        );
        let mut binds: Vec<String> = Vec::new();

        if !criteria.categories.is_empty() {
            sql.push_str(
                " AND p.id IN (SELECT pc.project_id FROM project_categories pc JOIN categories c ON c.id = pc.category_id WHERE c.name IN (",
            );
            sql.push_str(&placeholders(criteria.categories.len()));
            sql.push_str("))");
            binds.extend(criteria.categories.iter().cloned());
        }
        if !criteria.tags.is_empty() {
            sql.push_str(
                " AND p.id IN (SELECT pt.project_id FROM project_tags pt JOIN tags t ON t.id = pt.tag_id WHERE t.name IN (",
            );
            sql.push_str(&placeholders(criteria.tags.len()));
            sql.push_str("))");
            binds.extend(criteria.tags.iter().cloned());
        }

        // complexity range is applied in Rust below since it combines with a LEFT JOIN
        // value that may be NULL; the category/tag predicates above are the parameterized part.
        let rows = sqlx::query(
            "SELECT p.id as id, COALESCE(a.complexity_score, 0.0) as complexity_score FROM projects p LEFT JOIN analysis_results a ON a.project_id = p.id",
        )
        .fetch_all(&self.pool)
        .await?;
        let eligible_ids: HashSet<i64> = self
            .filter_ids(&sql, &binds)
            .await?
            .into_iter()
            .collect();

        let mut out = Vec::new();
        for row in rows {
            let id: i64 = row.get("id");
            if !criteria.categories.is_empty() || !criteria.tags.is_empty() {
                if !eligible_ids.contains(&id) {
                    continue;
                }
            }
            let score: f64 = row.get("complexity_score");
            if let Some(min) = criteria.complexity_min {
                if score < min {
                    continue;
                }
            }
            if let Some(max) = criteria.complexity_max {
                if score > max {
                    continue;
                }
            }
            out.push(id);
        }
        out.sort();
        Ok(out)
    }

    async fn filter_ids(&self, sql: &str, binds: &[String]) -> Result<Vec<i64>> {
        if binds.is_empty() {
            let rows = sqlx::query("SELECT id FROM projects").fetch_all(&self.pool).await?;
            return Ok(rows.into_iter().map(|r| r.get("id")).collect());
        }
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    /// Jaccard-like similarity across `{categories, tags, composition sizes,
    /// capability set}`, returning the top-K with an explanation per result.
    #[instrument(skip(self))]
    pub async fn similar(&self, project_id: i64, limit: Option<usize>) -> Result<Vec<SimilarResult>> {
        let target = self.get_project(project_id).await?;
        let target_set = feature_set(&target);

        let other_ids: Vec<i64> = sqlx::query("SELECT id FROM projects WHERE id != ?")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| r.get("id"))
            .collect();

        let mut scored = Vec::new();
        for id in other_ids {
            let candidate = self.get_project(id).await?;
            let candidate_set = feature_set(&candidate);
            let score = jaccard(&target_set, &candidate_set);
            let shared: Vec<&String> = target_set.intersection(&candidate_set).collect();
            let explanation = if shared.is_empty() {
                "no shared features".to_string()
            } else {
                format!("shares: {}", shared.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
            };
            scored.push(SimilarResult {
                project_id: id,
                score,
                explanation,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let limit = limit.unwrap_or(self.config.default_limit);
        scored.truncate(limit);
        Ok(scored)
    }
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

/// Collect the display names of every effect on a layer: each direct child of an
/// "ADBE Effect Parade" group is one applied effect.
fn effect_names(props: &[crate::aep::Property]) -> Vec<String> {
    let mut names = Vec::new();
    for p in props {
        if p.match_name == "ADBE Effect Parade" {
            for effect in &p.children {
                names.push(effect.display_name.clone());
            }
        }
        names.extend(effect_names(&p.children));
    }
    names
}

fn feature_set(record: &CatalogRecord) -> HashSet<String> {
    let mut set = HashSet::new();
    for c in &record.categories {
        set.insert(format!("category:{c}"));
    }
    for t in &record.tags {
        set.insert(format!("tag:{t}"));
    }
    for comp in &record.compositions {
        set.insert(format!("size:{}x{}", comp.width, comp.height));
    }
    if !record.effects.is_empty() {
        set.insert("capability:effects".to_string());
    }
    if !record.text_layers.is_empty() {
        set.insert("capability:text".to_string());
    }
    if !record.media_assets.is_empty() {
        set.insert("capability:media".to_string());
    }
    set
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn parse_difficulty(s: &str) -> crate::analyzer::Difficulty {
    use crate::analyzer::Difficulty::*;
    match s {
        "Trivial" => Trivial,
        "Hard" => Hard,
        _ => Moderate,
    }
}

fn parse_impact(s: &str) -> crate::analyzer::Impact {
    use crate::analyzer::Impact::*;
    match s {
        "Low" => Low,
        "High" => High,
        _ => Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aep::{BitDepth, Folder, Item, ItemKind, Project};
    use std::collections::HashMap;

    async fn test_store() -> CatalogStore {
        let config = CatalogConfig {
            database_url: "sqlite::memory:".to_string(),
            ..CatalogConfig::default()
        };
        CatalogStore::connect(config).await.unwrap()
    }

    fn sample_project(root_name: &str) -> Project {
        let mut items = HashMap::new();
        items.insert(
            1,
            Item {
                id: 1,
                name: root_name.to_string(),
                kind: ItemKind::Folder(Folder::default()),
            },
        );
        Project {
            bit_depth: BitDepth::Eight,
            expression_engine: String::new(),
            items,
            root_item_id: Some(1),
            fingerprint: format!("fp-{root_name}"),
            warnings: Vec::new(),
        }
    }

    fn sample_metadata(path: &str, name: &str) -> ProjectMetadata {
        let project = sample_project(name);
        ProjectMetadata {
            file_path: path.to_string(),
            file_name: format!("{name}.aep"),
            file_size: 1024,
            analysis: crate::analyzer::analyze(&project),
            project,
        }
    }

    #[tokio::test]
    async fn store_and_get_round_trip() {
        let store = test_store().await;
        let id = store.store_project(sample_metadata("/a/b.aep", "proj")).await.unwrap();
        let record = store.get_project(id).await.unwrap();
        assert_eq!(record.file_path, "/a/b.aep");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = test_store().await;
        let id1 = store.store_project(sample_metadata("/a/b.aep", "first")).await.unwrap();
        let id2 = store.store_project(sample_metadata("/a/b.aep", "second")).await.unwrap();
        assert_eq!(id1, id2);
        let record = store.get_project(id1).await.unwrap();
        assert_eq!(record.file_name, "second.aep");
    }

    #[tokio::test]
    async fn search_finds_by_file_name() {
        let store = test_store().await;
        store.store_project(sample_metadata("/a/b.aep", "alpha")).await.unwrap();
        let results = store.search("alpha", None).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    fn project_with_one_effect() -> Project {
        use crate::aep::{Composition, Layer, LayerFlags, Property, Quality, Sampling};

        let mut parade = Property::new("ADBE Effect Parade");
        parade.children.push(Property::new("ADBE Gaussian Blur 2"));

        let layer = Layer {
            index: 1,
            name: "Layer 1".to_string(),
            source_item_id: 0,
            quality: Quality::Best,
            sampling: Sampling::Bilinear,
            flags: LayerFlags::default(),
            properties: vec![parade],
            text: None,
        };

        let mut items = HashMap::new();
        items.insert(
            2,
            Item {
                id: 2,
                name: "Comp 1".to_string(),
                kind: ItemKind::Composition(Composition {
                    width: 1920,
                    height: 1080,
                    frame_rate: 24.0,
                    duration_seconds: 5.0,
                    background_color: (0, 0, 0),
                    layers: vec![layer],
                }),
            },
        );
        Project {
            bit_depth: BitDepth::Eight,
            expression_engine: String::new(),
            items,
            root_item_id: Some(2),
            fingerprint: "fp-effect".to_string(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn store_project_persists_effects() {
        let store = test_store().await;
        let project = project_with_one_effect();
        let metadata = ProjectMetadata {
            file_path: "/a/effect.aep".to_string(),
            file_name: "effect.aep".to_string(),
            file_size: 1024,
            analysis: crate::analyzer::analyze(&project),
            project,
        };
        let id = store.store_project(metadata).await.unwrap();
        let record = store.get_project(id).await.unwrap();

        assert_eq!(record.effects.len(), 1);
        assert_eq!(record.effects[0].name, "ADBE Gaussian Blur 2");
        assert_eq!(record.effects[0].layer_name, "Layer 1");
    }
}
