//! Graph store port (spec §6.3). Node labels and relationship labels are
//! the closed sets named there; the core only ever writes `Task` nodes
//! and the relation-kind edges, but the adapter's vocabulary is wider so
//! that other entity kinds can be layered on without a port change.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Task,
    User,
    Project,
    Document,
    Knowledge,
    Role,
    Execution,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::User => "User",
            Self::Project => "Project",
            Self::Document => "Document",
            Self::Knowledge => "Knowledge",
            Self::Role => "Role",
            Self::Execution => "Execution",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    ParentChild,
    SubtaskOf,
    DependsOn,
    Blocks,
    RelatesTo,
    DuplicateOf,
    AssignedTo,
    ExecutedBy,
    BelongsTo,
    Owns,
    References,
    KnowledgeReference,
    Creates,
    Learns,
    SimilarContent,
    SemanticCluster,
    Sequence,
    Precedes,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentChild => "ParentChild",
            Self::SubtaskOf => "SubtaskOf",
            Self::DependsOn => "DependsOn",
            Self::Blocks => "Blocks",
            Self::RelatesTo => "RelatesTo",
            Self::DuplicateOf => "DuplicateOf",
            Self::AssignedTo => "AssignedTo",
            Self::ExecutedBy => "ExecutedBy",
            Self::BelongsTo => "BelongsTo",
            Self::Owns => "Owns",
            Self::References => "References",
            Self::KnowledgeReference => "KnowledgeReference",
            Self::Creates => "Creates",
            Self::Learns => "Learns",
            Self::SimilarContent => "SimilarContent",
            Self::SemanticCluster => "SemanticCluster",
            Self::Sequence => "Sequence",
            Self::Precedes => "Precedes",
        }
    }
}

pub fn node_id(task_id: Uuid) -> String {
    task_id.to_string()
}

/// One row of a read-path query result (spec §6.3's `query` primitive).
#[derive(Debug, Clone, Default)]
pub struct GraphRow {
    pub fields: HashMap<String, Value>,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// `MERGE`-style upsert (spec §6.3, Design Notes: mandated, no raw
    /// `CREATE` + duplicate-key fallback).
    async fn upsert_node(&self, label: NodeLabel, id: &str, properties: HashMap<String, Value>) -> CoreResult<()>;

    async fn upsert_edge(
        &self,
        label: EdgeLabel,
        from_label: NodeLabel,
        from_id: &str,
        to_label: NodeLabel,
        to_id: &str,
        properties: HashMap<String, Value>,
    ) -> CoreResult<()>;

    /// Must succeed if the node is absent (delete-if-exists, spec §6.3).
    async fn delete_node_and_edges(&self, label: NodeLabel, id: &str) -> CoreResult<()>;

    /// Outgoing edges of `label` from `id`, read-only.
    async fn outgoing_edges(&self, label: EdgeLabel, from_id: &str) -> CoreResult<Vec<GraphRow>>;

    async fn contains_node(&self, label: NodeLabel, id: &str) -> CoreResult<bool>;

    /// All task ids that have at least one outgoing `DependsOn` edge,
    /// used by `full_cycle_check` (spec §4.6).
    async fn task_ids_with_dependencies(&self) -> CoreResult<Vec<String>>;
}
