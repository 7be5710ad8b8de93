//! Task domain model.
//!
//! A task is the unit the relational store owns as source of truth (spec
//! §3). Every mutation stamps a [`TripleSyncRecord`] describing whether the
//! vector and graph projections are caught up.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Ordered task priority (higher variants sort before lower ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Estimated complexity bucket, carried in the vector-store metadata
/// projection (spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

/// Kind of typed relationship between two tasks (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ParentChild,
    DependsOn,
    Blocks,
    RelatesTo,
    DuplicateOf,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentChild => "parent_child",
            Self::DependsOn => "depends_on",
            Self::Blocks => "blocks",
            Self::RelatesTo => "relates_to",
            Self::DuplicateOf => "duplicate_of",
        }
    }
}

/// Free-form metadata bag attached to a task (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub complexity: Option<Complexity>,
    pub estimated_effort: Option<f64>,
    pub actual_effort: Option<f64>,
    pub tags: Vec<String>,
    pub source_references: Vec<String>,
}

/// Overall per-task synchronization status (spec §3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Partial,
    Error,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Per-task record of synchronization state against the vector and graph
/// stores (spec §3's "triple-sync record").
///
/// Invariants (enforced by [`TripleSyncRecord::reconcile`], not by the
/// individual setters, so intermediate states can be built up during a
/// sync operation):
/// - `overall == Synced` iff both stores are synced and `sync_error` is
///   `None`.
/// - `overall == Partial` iff exactly one of the two store flags is true.
/// - `overall == Error` implies `sync_error.is_some()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleSyncRecord {
    pub overall: SyncStatus,
    pub vector_synced: bool,
    pub graph_synced: bool,
    pub last_indexed: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub content_hash: String,
    pub embedding_version: u32,
    pub vector_doc_id: Option<String>,
    pub graph_node_id: Option<String>,
    pub last_vector_sync_at: Option<DateTime<Utc>>,
    pub last_graph_sync_at: Option<DateTime<Utc>>,
}

impl TripleSyncRecord {
    pub fn new(content_hash: String) -> Self {
        Self {
            overall: SyncStatus::Pending,
            vector_synced: false,
            graph_synced: false,
            last_indexed: None,
            sync_error: None,
            content_hash,
            embedding_version: 0,
            vector_doc_id: None,
            graph_node_id: None,
            last_vector_sync_at: None,
            last_graph_sync_at: None,
        }
    }

    /// Recompute `overall` from the two store flags and the error slot,
    /// per the invariants documented on this type.
    pub fn reconcile(&mut self) {
        self.overall = match (self.vector_synced, self.graph_synced, &self.sync_error) {
            (true, true, None) => SyncStatus::Synced,
            (true, true, Some(_)) => SyncStatus::Partial,
            (true, false, _) | (false, true, _) => SyncStatus::Partial,
            (false, false, Some(_)) => SyncStatus::Error,
            (false, false, None) => SyncStatus::Pending,
        };
    }

    /// Reset sync flags so the task is re-synced from scratch, e.g. on a
    /// content change or a forced full resync (spec §3, §4.5).
    pub fn mark_stale(&mut self) {
        self.vector_synced = false;
        self.graph_synced = false;
        self.sync_error = None;
        self.overall = SyncStatus::Pending;
    }
}

/// A task's identity, content, lifecycle metadata, relations and
/// triple-sync record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub task_type: String,
    pub parent_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub feature: Option<String>,
    pub creator: Option<String>,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub metadata: TaskMetadata,
    pub relations: HashMap<RelationKind, HashSet<Uuid>>,
    pub triple: TripleSyncRecord,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        let title = title.into();
        let description = description.into();
        let content_hash = Self::compute_content_hash(&title, &description, &[]);
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            status: TaskStatus::Pending,
            priority: TaskPriority::Normal,
            task_type: "standard".to_string(),
            parent_id: None,
            project_id: None,
            feature: None,
            creator: None,
            assignee: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            due_at: None,
            metadata: TaskMetadata::default(),
            relations: HashMap::new(),
            triple: TripleSyncRecord::new(content_hash),
        }
    }

    /// Stable digest over title + description + references, used to
    /// detect whether re-embedding is necessary (spec §3).
    pub fn compute_content_hash(title: &str, description: &str, refs: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"\0");
        hasher.update(description.as_bytes());
        for r in refs {
            hasher.update(b"\0");
            hasher.update(r.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Recompute the content hash and mark the task stale for re-sync if
    /// it changed (spec §3's "content-hash changes" invariant).
    pub fn refresh_content_hash(&mut self) {
        let new_hash = Self::compute_content_hash(
            &self.title,
            &self.description,
            &self.metadata.source_references,
        );
        if new_hash != self.triple.content_hash {
            self.triple.content_hash = new_hash;
            self.triple.vector_synced = false;
            self.triple.reconcile();
        }
    }

    pub fn related(&self, kind: RelationKind) -> impl Iterator<Item = Uuid> + '_ {
        self.relations.get(&kind).into_iter().flatten().copied()
    }

    pub fn add_relation(&mut self, kind: RelationKind, target: Uuid) {
        self.relations.entry(kind).or_default().insert(target);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_and_unsynced() {
        let task = Task::new("Plan", "D");
        assert_eq!(task.triple.overall, SyncStatus::Pending);
        assert!(!task.triple.vector_synced);
        assert!(!task.triple.graph_synced);
    }

    #[test]
    fn reconcile_matches_invariants() {
        let mut triple = TripleSyncRecord::new("h".into());
        triple.vector_synced = true;
        triple.graph_synced = true;
        triple.reconcile();
        assert_eq!(triple.overall, SyncStatus::Synced);

        triple.graph_synced = false;
        triple.reconcile();
        assert_eq!(triple.overall, SyncStatus::Partial);

        triple.vector_synced = false;
        triple.sync_error = Some("boom".into());
        triple.reconcile();
        assert_eq!(triple.overall, SyncStatus::Error);
    }

    #[test]
    fn content_hash_change_resets_vector_synced() {
        let mut task = Task::new("A", "B");
        task.triple.vector_synced = true;
        task.triple.graph_synced = true;
        task.triple.reconcile();

        task.description = "changed".to_string();
        task.refresh_content_hash();

        assert!(!task.triple.vector_synced);
        assert_eq!(task.triple.overall, SyncStatus::Partial);
    }
}
