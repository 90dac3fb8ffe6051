//! Catalog schema DDL and migration runner.
//!
//! Mirrors the source's `SqliteMemoryStore::initialize` pattern: hand-written
//! `CREATE TABLE IF NOT EXISTS` statements executed in order, with a `schema_migrations`
//! table tracking which versions have been applied. Each migration runs in its own
//! transaction so a crash between DDL and the version-row insert is safely retried
//! (the DDL is idempotent).

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use crate::error::{CatalogError, CrateError, Result};

/// One migration: a monotonically increasing version plus its idempotent DDL.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_projects",
        sql: r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                bit_depth INTEGER NOT NULL,
                expression_engine TEXT NOT NULL DEFAULT '',
                parsed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_projects_parsed_at ON projects(parsed_at);
            CREATE INDEX IF NOT EXISTS idx_projects_fingerprint ON projects(fingerprint);
        "#,
    },
    Migration {
        version: 2,
        name: "create_compositions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS compositions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                frame_rate REAL NOT NULL,
                duration_seconds REAL NOT NULL,
                layer_count INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_compositions_project ON compositions(project_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_text_layers",
        sql: r#"
            CREATE TABLE IF NOT EXISTS text_layers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                composition_name TEXT NOT NULL,
                layer_name TEXT NOT NULL,
                text TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_text_layers_project ON text_layers(project_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_media_assets",
        sql: r#"
            CREATE TABLE IF NOT EXISTS media_assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                footage_kind TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_assets_project ON media_assets(project_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_effects",
        sql: r#"
            CREATE TABLE IF NOT EXISTS effects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                layer_name TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_effects_project ON effects(project_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_categories_and_tags",
        sql: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS project_categories (
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (project_id, category_id)
            );
            CREATE TABLE IF NOT EXISTS project_tags (
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (project_id, tag_id)
            );
        "#,
    },
    Migration {
        version: 7,
        name: "create_opportunities_and_analysis",
        sql: r#"
            CREATE TABLE IF NOT EXISTS opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                impact TEXT NOT NULL,
                components TEXT NOT NULL,
                rank INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS analysis_results (
                project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                complexity_score REAL NOT NULL,
                automation_score REAL NOT NULL,
                analysis_data TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 8,
        name: "create_search_index",
        sql: r#"
            CREATE TABLE IF NOT EXISTS search_index (
                project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                blob TEXT NOT NULL
            );
        "#,
    },
];

/// Ensure `schema_migrations` exists, then apply every migration whose version has not
/// yet been recorded, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let already_applied: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM schema_migrations WHERE version = ?")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;

        if already_applied.is_some() {
            debug!(version = migration.version, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| {
                CrateError::Catalog(CatalogError::MigrationFailed {
                    version: migration.version,
                    reason: e.to_string(),
                })
            })?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(version = migration.version, name = migration.name, "applied migration");
    }

    Ok(())
}
