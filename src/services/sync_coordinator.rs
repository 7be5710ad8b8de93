//! Relational-to-vector/graph sync coordinator (spec §4.5, C5).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{Store, TripleDbError};
use crate::domain::models::event::{EventKind, TaskEvent};
use crate::domain::models::task::{RelationKind, SyncStatus, Task};
use crate::domain::ports::graph_store::{node_id, EdgeLabel, GraphStore, NodeLabel};
use crate::domain::ports::relational_store::{RelationalStore, TaskPatch};
use crate::domain::ports::vector_store::{document_id, VectorMetadata, VectorStore};
use crate::services::circuit_breaker::CircuitBreakerRegistry;
use crate::services::event_bus::EventBus;
use crate::services::recovery::RecoveryRegistry;
use crate::services::resource_manager::ResourceManager;

const MAX_BATCH: usize = 10;
const BATCH_WINDOW_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const BACKOFF_CAP_SECS: u64 = 60;
const DEFAULT_EMBEDDING_MAX_CONTENT_LENGTH: usize = 2000;

/// What kind of relational mutation triggered the sync (spec §4.5's
/// `schedule_sync(task_id, op_kind, targets, priority)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOpKind {
    Create,
    Update,
    Delete,
}

/// Which derived stores an operation should project into, a subset of
/// `{vector, graph}` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTargets {
    pub vector: bool,
    pub graph: bool,
}

impl SyncTargets {
    pub const ALL: Self = Self { vector: true, graph: true };
    pub const VECTOR_ONLY: Self = Self { vector: true, graph: false };
    pub const GRAPH_ONLY: Self = Self { vector: false, graph: true };
}

/// Batch ordering key: `high < normal < low` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPriority {
    High,
    Normal,
    Low,
}

impl Default for SyncPriority {
    fn default() -> Self {
        Self::Normal
    }
}

fn relation_edge_label(kind: RelationKind) -> EdgeLabel {
    match kind {
        RelationKind::ParentChild => EdgeLabel::ParentChild,
        RelationKind::DependsOn => EdgeLabel::DependsOn,
        RelationKind::Blocks => EdgeLabel::Blocks,
        RelationKind::RelatesTo => EdgeLabel::RelatesTo,
        RelationKind::DuplicateOf => EdgeLabel::DuplicateOf,
    }
}

/// Build the vector-store embedding text (spec §6.2): title + description
/// + an optional references block, truncated with a `"..."` marker.
fn build_embedding_text(task: &Task, max_len: usize) -> String {
    let mut text = format!("{}\n\n{}", task.title, task.description);
    if !task.metadata.source_references.is_empty() {
        text.push_str("\n\nReferences:\n");
        text.push_str(&task.metadata.source_references.join("\n"));
    }
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len).collect();
        truncated + "..."
    } else {
        text
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncStatistics {
    pub synced: u64,
    pub errors: u64,
    pub pending: usize,
    pub in_flight: usize,
}

struct RetryState {
    retry_count: u32,
}

#[derive(Clone, Copy)]
struct QueuedSync {
    op_kind: SyncOpKind,
    targets: SyncTargets,
    priority: SyncPriority,
    created_at: DateTime<Utc>,
}

/// Batches pending task ids (up to [`MAX_BATCH`] or every
/// [`BATCH_WINDOW_SECS`]), serializes concurrent syncs of the same task,
/// and projects the relational row into the vector and graph stores
/// (spec §4.5).
pub struct SyncCoordinator {
    relational: Arc<dyn RelationalStore>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    resources: Arc<ResourceManager>,
    circuits: Arc<CircuitBreakerRegistry>,
    recovery: Arc<RecoveryRegistry>,
    event_bus: Arc<EventBus>,
    embedding_max_content_length: usize,
    pending: Mutex<HashMap<Uuid, QueuedSync>>,
    in_flight: Mutex<HashSet<Uuid>>,
    retries: Mutex<HashMap<Uuid, RetryState>>,
    synced_count: AtomicU64,
    error_count: AtomicU64,
    running: AtomicBool,
    flush_tx: mpsc::UnboundedSender<()>,
    flush_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    batcher: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        resources: Arc<ResourceManager>,
        circuits: Arc<CircuitBreakerRegistry>,
        recovery: Arc<RecoveryRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Self::with_embedding_max_content_length(
            relational,
            vector,
            graph,
            resources,
            circuits,
            recovery,
            event_bus,
            DEFAULT_EMBEDDING_MAX_CONTENT_LENGTH,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_embedding_max_content_length(
        relational: Arc<dyn RelationalStore>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        resources: Arc<ResourceManager>,
        circuits: Arc<CircuitBreakerRegistry>,
        recovery: Arc<RecoveryRegistry>,
        event_bus: Arc<EventBus>,
        embedding_max_content_length: usize,
    ) -> Arc<Self> {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            relational,
            vector,
            graph,
            resources,
            circuits,
            recovery,
            event_bus,
            embedding_max_content_length,
            pending: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            retries: Mutex::new(HashMap::new()),
            synced_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
            flush_tx,
            flush_rx: Mutex::new(Some(flush_rx)),
            batcher: Mutex::new(None),
        })
    }

    /// Start the background batcher: flushes when the pending set reaches
    /// [`MAX_BATCH`] or every [`BATCH_WINDOW_SECS`], whichever first.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut rx = self.flush_rx.lock().await.take().expect("batcher already started");
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(BATCH_WINDOW_SECS));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        coordinator.flush().await;
                    }
                    signal = rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        coordinator.flush().await;
                    }
                }
                if !coordinator.running.load(Ordering::SeqCst) {
                    break;
                }
            }
        });
        *self.batcher.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.flush_tx.send(());
        if let Some(handle) = self.batcher.lock().await.take() {
            handle.abort();
        }
    }

    /// Queue `task_id` for batched sync; triggers an immediate flush once
    /// the batch reaches its size cap (spec §4.5). A task id currently in
    /// flight still gets queued (so a mutation that arrives mid-sync is
    /// not lost) but is skipped by `flush` until the in-flight sync
    /// completes.
    pub async fn schedule_sync(&self, task_id: Uuid, op_kind: SyncOpKind, targets: SyncTargets, priority: SyncPriority) {
        let should_flush = {
            let mut pending = self.pending.lock().await;
            pending.insert(task_id, QueuedSync { op_kind, targets, priority, created_at: Utc::now() });
            pending.len() >= MAX_BATCH
        };
        if should_flush {
            let _ = self.flush_tx.send(());
        }
    }

    /// Sync `task_id` immediately, bypassing the batch window, against
    /// both the vector and graph stores.
    pub async fn sync_immediate(&self, task_id: Uuid, op_kind: SyncOpKind) -> Result<(), TripleDbError> {
        self.pending.lock().await.remove(&task_id);
        self.sync_one(task_id, op_kind, SyncTargets::ALL).await
    }

    /// Vector-only projection used by the auto-embedding background
    /// service (spec §4.6): never touches the graph store.
    pub async fn sync_vector_only(&self, task_id: Uuid) -> Result<(), TripleDbError> {
        self.pending.lock().await.remove(&task_id);
        self.sync_one(task_id, SyncOpKind::Update, SyncTargets::VECTOR_ONLY).await
    }

    /// Task-mutation entry point (spec §2's control flow): persists the
    /// task, publishes the `created` lifecycle event, and schedules a
    /// sync. The only writer of new task rows outside of direct adapter
    /// use by tests.
    pub async fn create_task(&self, task: &Task) -> Result<(), TripleDbError> {
        self.relational.insert_task(task).await?;
        self.event_bus
            .publish(TaskEvent::new(EventKind::Created, task.id, "sync_coordinator"))
            .await;
        self.schedule_sync(task.id, SyncOpKind::Create, SyncTargets::ALL, SyncPriority::Normal).await;
        Ok(())
    }

    /// Mark every task stale and schedule a full resync (spec §4.5,
    /// "force full resync").
    pub async fn force_full_resync(&self) -> Result<(), TripleDbError> {
        let tasks = self
            .relational
            .list_tasks(Default::default(), usize::MAX)
            .await?;
        for task in tasks {
            let mut triple = task.triple.clone();
            triple.mark_stale();
            self.relational
                .update_task(task.id, TaskPatch { status: None, triple: Some(triple) })
                .await?;
            self.schedule_sync(task.id, SyncOpKind::Update, SyncTargets::ALL, SyncPriority::Normal).await;
        }
        Ok(())
    }

    pub async fn statistics(&self) -> SyncStatistics {
        SyncStatistics {
            synced: self.synced_count.load(Ordering::SeqCst),
            errors: self.error_count.load(Ordering::SeqCst),
            pending: self.pending.lock().await.len(),
            in_flight: self.in_flight.lock().await.len(),
        }
    }

    async fn flush(&self) {
        let batch: Vec<(Uuid, QueuedSync)> = {
            let mut pending = self.pending.lock().await;
            let in_flight = self.in_flight.lock().await;
            let mut ready: Vec<(Uuid, QueuedSync)> = pending
                .iter()
                .filter(|(id, _)| !in_flight.contains(id))
                .map(|(id, op)| (*id, *op))
                .collect();
            drop(in_flight);
            // batch processed ordered by (priority, creation_time) ascending (spec §4.5).
            ready.sort_by(|a, b| a.1.priority.cmp(&b.1.priority).then(a.1.created_at.cmp(&b.1.created_at)));
            ready.truncate(MAX_BATCH);
            for (id, _) in &ready {
                pending.remove(id);
            }
            ready
        };
        for (task_id, op) in batch {
            if let Err(err) = self.sync_one(task_id, op.op_kind, op.targets).await {
                warn!(task_id = %task_id, error = %err, "sync failed, scheduling retry");
                self.schedule_retry(task_id, op.op_kind, op.targets, op.priority).await;
            }
        }
    }

    async fn schedule_retry(&self, task_id: Uuid, op_kind: SyncOpKind, targets: SyncTargets, priority: SyncPriority) {
        let retry_count = {
            let mut retries = self.retries.lock().await;
            let state = retries.entry(task_id).or_insert(RetryState { retry_count: 0 });
            state.retry_count += 1;
            state.retry_count
        };
        if retry_count > MAX_RETRIES {
            error!(task_id = %task_id, "sync retries exhausted");
            self.retries.lock().await.remove(&task_id);
            return;
        }
        let backoff = 2u64.saturating_pow(retry_count).min(BACKOFF_CAP_SECS);
        let pending = self.flush_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            let _ = pending.send(());
        });
        self.pending
            .lock()
            .await
            .insert(task_id, QueuedSync { op_kind, targets, priority, created_at: Utc::now() });
    }

    /// Execute one task's sync: serialize against concurrent syncs of the
    /// same id, then project into the requested stores with
    /// upsert/delete semantics, reconciling the triple-sync record.
    async fn sync_one(&self, task_id: Uuid, op_kind: SyncOpKind, targets: SyncTargets) -> Result<(), TripleDbError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(task_id) {
                return Ok(());
            }
        }
        let result = self.sync_one_inner(task_id, op_kind, targets).await;
        self.in_flight.lock().await.remove(&task_id);
        result
    }

    async fn sync_one_inner(&self, task_id: Uuid, op_kind: SyncOpKind, targets: SyncTargets) -> Result<(), TripleDbError> {
        if op_kind == SyncOpKind::Delete {
            return self.delete_projections(task_id, targets).await;
        }

        let Some(task) = self.relational.get_task(task_id).await? else {
            return self.delete_projections(task_id, targets).await;
        };

        let vector_result = if targets.vector { Some(self.sync_vector(&task).await) } else { None };
        let graph_result = if targets.graph { Some(self.sync_graph(&task).await) } else { None };

        let mut triple = task.triple.clone();
        if let Some(result) = &vector_result {
            triple.vector_synced = result.is_ok();
            if triple.vector_synced {
                triple.last_vector_sync_at = Some(Utc::now());
            }
        }
        if let Some(result) = &graph_result {
            triple.graph_synced = result.is_ok();
            if triple.graph_synced {
                triple.last_graph_sync_at = Some(Utc::now());
            }
        }
        triple.sync_error = vector_result
            .as_ref()
            .and_then(|r| r.as_ref().err())
            .or_else(|| graph_result.as_ref().and_then(|r| r.as_ref().err()))
            .map(|e| e.to_string());
        if triple.vector_synced && triple.graph_synced {
            triple.last_indexed = Some(Utc::now());
        }
        triple.reconcile();

        self.relational
            .update_task(task_id, TaskPatch { status: None, triple: Some(triple.clone()) })
            .await?;

        if triple.overall == SyncStatus::Synced {
            self.synced_count.fetch_add(1, Ordering::SeqCst);
            self.event_bus
                .publish(TaskEvent::new(EventKind::StatusChanged, task_id, "sync_coordinator"))
                .await;
        } else {
            self.error_count.fetch_add(1, Ordering::SeqCst);
        }

        match (vector_result, graph_result) {
            (Some(v), Some(g)) => v.and(g),
            (Some(v), None) => v,
            (None, Some(g)) => g,
            (None, None) => Ok(()),
        }
    }

    async fn sync_vector(&self, task: &Task) -> Result<(), TripleDbError> {
        let Some(_guard) = crate::services::resource_manager::ResourceGuard::try_acquire(&self.resources, Store::Vector) else {
            return Err(TripleDbError::connection_failed(Store::Vector, "resource cap exhausted"));
        };
        let vector = self.vector.clone();
        let doc_id = document_id(task.id);
        let text = build_embedding_text(task, self.embedding_max_content_length);
        let metadata = VectorMetadata {
            task_id: task.id.to_string(),
            title: Some(task.title.clone()),
            content_hash: Some(task.triple.content_hash.clone()),
            project_id: task.project_id.map(|p| p.to_string()),
            parent_task_id: task.parent_id.map(|p| p.to_string()),
            feature: task.feature.clone(),
            status: Some(task.status.as_str().to_string()),
            priority: Some(format!("{:?}", task.priority)),
            created_at: Some(task.created_at),
            updated_at: Some(task.updated_at),
            complexity: task.metadata.complexity.map(|c| format!("{c:?}")),
            estimated_effort: task.metadata.estimated_effort.map(|e| e.to_string()),
            tags: task.metadata.tags.clone(),
            assignee: task.assignee.clone(),
            assigned_role: None,
            embedding_version: task.triple.embedding_version,
            embedded_at: task.triple.last_vector_sync_at,
        };
        let result = self
            .circuits
            .guard(Store::Vector, || async move { vector.upsert(&doc_id, &text, metadata).await })
            .await;
        if let Err(err) = &result {
            self.recovery.handle(err, HashMap::new()).await;
        }
        result
    }

    async fn sync_graph(&self, task: &Task) -> Result<(), TripleDbError> {
        let Some(_guard) = crate::services::resource_manager::ResourceGuard::try_acquire(&self.resources, Store::Graph) else {
            return Err(TripleDbError::connection_failed(Store::Graph, "resource cap exhausted"));
        };
        let graph = self.graph.clone();
        let id = node_id(task.id);
        let mut properties = std::collections::HashMap::new();
        properties.insert("title".to_string(), serde_json::Value::String(task.title.clone()));
        properties.insert("status".to_string(), serde_json::Value::String(task.status.as_str().to_string()));

        let relations: Vec<(RelationKind, Vec<Uuid>)> = task
            .relations
            .iter()
            .map(|(k, set)| (*k, set.iter().copied().collect()))
            .collect();
        let task_id = task.id;

        let result = self
            .circuits
            .guard(Store::Graph, || async move {
                graph.upsert_node(NodeLabel::Task, &id, properties).await?;
                for (kind, targets) in relations {
                    for target in targets {
                        graph
                            .upsert_edge(
                                relation_edge_label(kind),
                                NodeLabel::Task,
                                &node_id(task_id),
                                NodeLabel::Task,
                                &node_id(target),
                                HashMap::new(),
                            )
                            .await?;
                    }
                }
                Ok(())
            })
            .await;
        if let Err(err) = &result {
            self.recovery.handle(err, HashMap::new()).await;
        }
        result
    }

    async fn delete_projections(&self, task_id: Uuid, targets: SyncTargets) -> Result<(), TripleDbError> {
        if targets.vector {
            self.vector.delete(&document_id(task_id)).await?;
        }
        if targets.graph {
            self.graph.delete_node_and_edges(NodeLabel::Task, &node_id(task_id)).await?;
        }
        info!(task_id = %task_id, "deleted triple-store projections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraphStore, InMemoryVectorStore};
    use crate::adapters::sqlite::relational_store::SqliteRelationalStore;
    use crate::services::circuit_breaker::CircuitBreakerConfig;
    use crate::services::resource_manager::ResourceManagerConfig;

    async fn make_coordinator() -> Arc<SyncCoordinator> {
        let pool = crate::adapters::sqlite::connection::create_test_pool().await.unwrap();
        crate::adapters::sqlite::migrations::Migrator::new(pool.clone()).run().await.unwrap();
        let relational: Arc<dyn RelationalStore> = Arc::new(SqliteRelationalStore::new(pool));
        let vector: Arc<dyn VectorStore> = InMemoryVectorStore::new();
        let graph: Arc<dyn GraphStore> = InMemoryGraphStore::new();
        let resources = Arc::new(ResourceManager::new(ResourceManagerConfig::default()));
        let circuits = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        let recovery = Arc::new(RecoveryRegistry::new(300));
        let event_bus = EventBus::new();
        SyncCoordinator::new(relational, vector, graph, resources, circuits, recovery, event_bus)
    }

    #[tokio::test]
    async fn sync_immediate_projects_into_both_stores() {
        let coordinator = make_coordinator().await;
        let task = Task::new("Plan launch", "details");
        coordinator.relational.insert_task(&task).await.unwrap();

        coordinator.sync_immediate(task.id, SyncOpKind::Create).await.unwrap();

        let stored = coordinator.relational.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.triple.overall, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn schedule_sync_flushes_at_batch_cap() {
        let coordinator = make_coordinator().await;
        for _ in 0..MAX_BATCH {
            let task = Task::new("t", "d");
            coordinator.relational.insert_task(&task).await.unwrap();
            coordinator
                .schedule_sync(task.id, SyncOpKind::Create, SyncTargets::ALL, SyncPriority::Normal)
                .await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let stats = coordinator.statistics().await;
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn flush_drains_high_priority_before_low_within_the_batch_cap() {
        let coordinator = make_coordinator().await;
        let mut low_ids = Vec::new();
        for _ in 0..8 {
            let task = Task::new("low", "d");
            coordinator.relational.insert_task(&task).await.unwrap();
            coordinator
                .schedule_sync(task.id, SyncOpKind::Create, SyncTargets::ALL, SyncPriority::Low)
                .await;
            low_ids.push(task.id);
        }
        let mut high_ids = Vec::new();
        for _ in 0..4 {
            let task = Task::new("high", "d");
            coordinator.relational.insert_task(&task).await.unwrap();
            coordinator
                .schedule_sync(task.id, SyncOpKind::Create, SyncTargets::ALL, SyncPriority::High)
                .await;
            high_ids.push(task.id);
        }

        coordinator.flush().await;

        let still_pending: HashSet<Uuid> = coordinator.pending.lock().await.keys().copied().collect();
        assert_eq!(still_pending.len(), 2, "only 2 of the 12 queued ids should survive a 10-cap flush");
        for id in &high_ids {
            assert!(!still_pending.contains(id), "high-priority task was left behind by a low-priority one");
        }
        assert!(low_ids.iter().filter(|id| still_pending.contains(id)).count() == 2);
    }
}
