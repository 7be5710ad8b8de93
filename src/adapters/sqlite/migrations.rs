//! SQLite schema migration management.
//!
//! The actual relational schema is out of scope of this crate (spec
//! §1); this embedded migration is the minimal shape the sqlite adapter
//! needs to satisfy the `RelationalStore` port.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to read schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub fn embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "create tasks table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                task_type TEXT NOT NULL,
                parent_id TEXT,
                project_id TEXT,
                feature TEXT,
                creator TEXT,
                assignee TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                due_at TEXT,
                metadata_json TEXT NOT NULL,
                relations_json TEXT NOT NULL,
                triple_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        "#,
    }]
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run(&self) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let pending: Vec<_> = embedded_migrations()
            .into_iter()
            .filter(|m| m.version > current)
            .collect();

        for migration in &pending {
            sqlx::query(migration.sql)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::ExecutionError {
                    version: migration.version,
                    source,
                })?;
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.description)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::ExecutionError {
                    version: migration.version,
                    source,
                })?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| MigrationError::ExecutionError { version: 0, source })?;
        Ok(())
    }

    async fn current_version(&self) -> Result<i64, MigrationError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(version.unwrap_or(0))
    }
}
