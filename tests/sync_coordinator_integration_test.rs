//! End-to-end sync coordinator test: relational inserts followed by
//! scheduled syncs land projections in both the vector and graph stores.

mod common;

use std::time::Duration;

use tripledb_sync_core::domain::ports::graph_store::{node_id, NodeLabel};
use tripledb_sync_core::domain::ports::vector_store::document_id;
use tripledb_sync_core::domain::ports::RelationalStore;
use tripledb_sync_core::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use tripledb_sync_core::services::event_bus::EventBus;
use tripledb_sync_core::services::recovery::RecoveryRegistry;
use tripledb_sync_core::services::resource_manager::{ResourceManager, ResourceManagerConfig};
use tripledb_sync_core::services::sync_coordinator::{SyncCoordinator, SyncOpKind, SyncPriority, SyncTargets};

fn new_coordinator(
    relational: std::sync::Arc<dyn RelationalStore>,
    vector: std::sync::Arc<dyn tripledb_sync_core::domain::ports::VectorStore>,
    graph: std::sync::Arc<dyn tripledb_sync_core::domain::ports::GraphStore>,
) -> std::sync::Arc<SyncCoordinator> {
    SyncCoordinator::new(
        relational,
        vector,
        graph,
        ResourceManager::new(ResourceManagerConfig::default()).into(),
        CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        RecoveryRegistry::new(300).into(),
        EventBus::new(),
    )
}

#[tokio::test]
async fn batch_cap_triggers_automatic_flush_into_both_stores() {
    let relational = common::relational_store().await;
    let vector = common::vector_store();
    let graph = common::graph_store();
    let coordinator = new_coordinator(relational.clone(), vector.clone(), graph.clone());
    coordinator.start().await;

    let mut ids = Vec::new();
    for i in 0..10 {
        let task = common::sample_task(&format!("batch task {i}"));
        relational.insert_task(&task).await.expect("insert task");
        ids.push(task.id);
        coordinator
            .schedule_sync(task.id, SyncOpKind::Create, SyncTargets::ALL, SyncPriority::Normal)
            .await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    for id in ids {
        assert!(vector.contains(&document_id(id)).await.expect("vector contains"));
        assert!(graph
            .contains_node(NodeLabel::Task, &node_id(id))
            .await
            .expect("graph contains node"));
    }

    coordinator.stop().await;
}

#[tokio::test]
async fn sync_immediate_reconciles_triple_record_to_synced() {
    let relational = common::relational_store().await;
    let vector = common::vector_store();
    let graph = common::graph_store();
    let coordinator = new_coordinator(relational.clone(), vector, graph);

    let task = common::sample_task("Reconcile me");
    relational.insert_task(&task).await.expect("insert task");

    coordinator.sync_immediate(task.id, SyncOpKind::Create).await.expect("sync immediate");

    let synced = relational.get_task(task.id).await.expect("get task").expect("task exists");
    assert!(synced.triple.vector_synced);
    assert!(synced.triple.graph_synced);
}

#[tokio::test]
async fn deleting_a_task_removes_its_projections() {
    let relational = common::relational_store().await;
    let vector = common::vector_store();
    let graph = common::graph_store();
    let coordinator = new_coordinator(relational.clone(), vector.clone(), graph.clone());

    let task = common::sample_task("Delete me");
    relational.insert_task(&task).await.expect("insert task");
    coordinator.sync_immediate(task.id, SyncOpKind::Create).await.expect("sync immediate");
    assert!(vector.contains(&document_id(task.id)).await.expect("vector contains"));

    relational.delete_task(task.id).await.expect("delete task");
    coordinator
        .sync_immediate(task.id, SyncOpKind::Delete)
        .await
        .expect("sync immediate after delete");

    assert!(!vector.contains(&document_id(task.id)).await.expect("vector contains"));
    assert!(!graph
        .contains_node(NodeLabel::Task, &node_id(task.id))
        .await
        .expect("graph contains node"));
}
