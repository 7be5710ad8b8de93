//! SQLite implementation of the `RelationalStore` port (spec §6.1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::errors::{Store, TripleDbError};
use crate::domain::models::{RelationKind, Task, TaskMetadata, TaskPriority, TaskStatus, TripleSyncRecord};
use crate::domain::ports::{RelationalStore, TaskFilter, TaskPatch};

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    task_type: String,
    parent_id: Option<String>,
    project_id: Option<String>,
    feature: Option<String>,
    creator: Option<String>,
    assignee: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    due_at: Option<String>,
    metadata_json: String,
    relations_json: String,
    triple_json: String,
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "in-progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

fn parse_priority(s: &str) -> TaskPriority {
    match s {
        "critical" => TaskPriority::Critical,
        "high" => TaskPriority::High,
        "low" => TaskPriority::Low,
        _ => TaskPriority::Normal,
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_dt(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_dt)
}

impl TryFrom<TaskRow> for Task {
    type Error = TripleDbError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let db_err = |message: String| TripleDbError::Base {
            store: Store::Relational,
            operation: "deserialize_task".to_string(),
            message,
        };

        let metadata: TaskMetadata =
            serde_json::from_str(&row.metadata_json).map_err(|e| db_err(e.to_string()))?;
        let relations: HashMap<RelationKind, HashSet<Uuid>> =
            serde_json::from_str(&row.relations_json).map_err(|e| db_err(e.to_string()))?;
        let triple: TripleSyncRecord =
            serde_json::from_str(&row.triple_json).map_err(|e| db_err(e.to_string()))?;

        Ok(Task {
            id: Uuid::parse_str(&row.id).map_err(|e| db_err(e.to_string()))?,
            title: row.title,
            description: row.description,
            status: parse_status(&row.status),
            priority: parse_priority(&row.priority),
            task_type: row.task_type,
            parent_id: row.parent_id.and_then(|s| Uuid::parse_str(&s).ok()),
            project_id: row.project_id.and_then(|s| Uuid::parse_str(&s).ok()),
            feature: row.feature,
            creator: row.creator,
            assignee: row.assignee,
            created_at: parse_dt(&row.created_at),
            updated_at: parse_dt(&row.updated_at),
            started_at: parse_opt_dt(&row.started_at),
            completed_at: parse_opt_dt(&row.completed_at),
            due_at: parse_opt_dt(&row.due_at),
            metadata,
            relations,
            triple,
        })
    }
}

#[derive(Clone)]
pub struct SqliteRelationalStore {
    pool: SqlitePool,
}

impl SqliteRelationalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn db_err(operation: &str, error: impl std::fmt::Display) -> TripleDbError {
        TripleDbError::Base {
            store: Store::Relational,
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    async fn get_task(&self, id: Uuid) -> crate::domain::errors::CoreResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err("get_task", e))?;

        row.map(Task::try_from).transpose()
    }

    async fn list_tasks(&self, filter: TaskFilter, limit: usize) -> crate::domain::errors::CoreResult<Vec<Task>> {
        let mut sql = "SELECT * FROM tasks WHERE 1=1".to_string();
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.project_id.is_some() {
            sql.push_str(" AND project_id = ?");
        }
        sql.push_str(" ORDER BY created_at ASC LIMIT ?");

        let mut query = sqlx::query_as::<_, TaskRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(project_id) = filter.project_id {
            query = query.bind(project_id.to_string());
        }
        query = query.bind(limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::db_err("list_tasks", e))?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn insert_task(&self, task: &Task) -> crate::domain::errors::CoreResult<()> {
        let metadata_json = serde_json::to_string(&task.metadata).map_err(|e| Self::db_err("insert_task", e))?;
        let relations_json = serde_json::to_string(&task.relations).map_err(|e| Self::db_err("insert_task", e))?;
        let triple_json = serde_json::to_string(&task.triple).map_err(|e| Self::db_err("insert_task", e))?;

        sqlx::query(
            r#"INSERT INTO tasks (id, title, description, status, priority, task_type,
               parent_id, project_id, feature, creator, assignee, created_at, updated_at,
               started_at, completed_at, due_at, metadata_json, relations_json, triple_json)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(format!("{:?}", task.priority).to_lowercase())
        .bind(&task.task_type)
        .bind(task.parent_id.map(|id| id.to_string()))
        .bind(task.project_id.map(|id| id.to_string()))
        .bind(&task.feature)
        .bind(&task.creator)
        .bind(&task.assignee)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.due_at.map(|t| t.to_rfc3339()))
        .bind(metadata_json)
        .bind(relations_json)
        .bind(triple_json)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("insert_task", e))?;

        Ok(())
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> crate::domain::errors::CoreResult<()> {
        let Some(mut task) = self.get_task(id).await? else {
            return Err(TripleDbError::Base {
                store: Store::Relational,
                operation: "update_task".to_string(),
                message: format!("task {id} not found"),
            });
        };

        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(triple) = patch.triple {
            task.triple = triple;
        }
        task.touch();

        let metadata_json = serde_json::to_string(&task.metadata).map_err(|e| Self::db_err("update_task", e))?;
        let relations_json = serde_json::to_string(&task.relations).map_err(|e| Self::db_err("update_task", e))?;
        let triple_json = serde_json::to_string(&task.triple).map_err(|e| Self::db_err("update_task", e))?;

        sqlx::query(
            "UPDATE tasks SET status = ?, updated_at = ?, metadata_json = ?, relations_json = ?, triple_json = ? WHERE id = ?",
        )
        .bind(task.status.as_str())
        .bind(task.updated_at.to_rfc3339())
        .bind(metadata_json)
        .bind(relations_json)
        .bind(triple_json)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("update_task", e))?;

        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> crate::domain::errors::CoreResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_err("delete_task", e))?;
        Ok(())
    }
}
