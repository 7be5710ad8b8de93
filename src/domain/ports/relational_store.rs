//! Relational store port (spec §6.1). The relational store is the source
//! of truth; it exclusively owns the task row and the triple-sync record.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Task, TaskStatus, TripleSyncRecord};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub project_id: Option<Uuid>,
}

/// A partial update applied to a task row. `None` fields are left
/// untouched; `triple` replaces the whole triple-sync sub-object when
/// present, matching spec §6.1's "patch may include the full triple-sync
/// sub-object".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub triple: Option<TripleSyncRecord>,
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn get_task(&self, id: Uuid) -> CoreResult<Option<Task>>;

    async fn list_tasks(&self, filter: TaskFilter, limit: usize) -> CoreResult<Vec<Task>>;

    async fn insert_task(&self, task: &Task) -> CoreResult<()>;

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> CoreResult<()>;

    async fn delete_task(&self, id: Uuid) -> CoreResult<()>;
}
