//! Vector store port (spec §6.2). A single logical collection
//! `tasks_content`, document id convention `task_<task_id>_content`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::CoreResult;

/// Required metadata fields per document (spec §6.2). All optional
/// unless noted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub task_id: String,
    pub title: Option<String>,
    pub content_hash: Option<String>,
    pub project_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub feature: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub complexity: Option<String>,
    pub estimated_effort: Option<String>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub assigned_role: Option<String>,
    pub embedding_version: u32,
    pub embedded_at: Option<DateTime<Utc>>,
}

pub fn document_id(task_id: Uuid) -> String {
    format!("task_{task_id}_content")
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection on demand, then update-if-present /
    /// add-if-not (upsert semantics, spec §6.2).
    async fn upsert(&self, doc_id: &str, text: &str, metadata: VectorMetadata) -> CoreResult<()>;

    /// Must succeed even if `doc_id` is absent (spec §6.2, §8 idempotence).
    async fn delete(&self, doc_id: &str) -> CoreResult<()>;

    /// Creates the named collection if it does not already exist.
    async fn get_collection(&self, name: &str) -> CoreResult<()>;

    /// True if a document with this id currently exists. Used by tests
    /// and by the incremental-sync service's leak detection (spec §3).
    async fn contains(&self, doc_id: &str) -> CoreResult<bool>;
}
