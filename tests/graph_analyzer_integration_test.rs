//! Graph analyzer integration test: task dependency edges created by the
//! sync coordinator's graph projection are visible to cycle detection.

mod common;

use tripledb_sync_core::domain::models::RelationKind;
use tripledb_sync_core::domain::ports::RelationalStore;
use tripledb_sync_core::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use tripledb_sync_core::services::event_bus::EventBus;
use tripledb_sync_core::services::graph_analyzer::GraphAnalyzer;
use tripledb_sync_core::services::recovery::RecoveryRegistry;
use tripledb_sync_core::services::resource_manager::{ResourceManager, ResourceManagerConfig};
use tripledb_sync_core::services::sync_coordinator::{SyncCoordinator, SyncOpKind};

#[tokio::test]
async fn cycle_created_through_task_relations_is_detected_after_sync() {
    let relational = common::relational_store().await;
    let vector = common::vector_store();
    let graph = common::graph_store();

    let mut a = common::sample_task("A");
    let mut b = common::sample_task("B");
    a.add_relation(RelationKind::DependsOn, b.id);
    b.add_relation(RelationKind::DependsOn, a.id);
    relational.insert_task(&a).await.expect("insert a");
    relational.insert_task(&b).await.expect("insert b");

    let coordinator = SyncCoordinator::new(
        relational.clone(),
        vector,
        graph.clone(),
        ResourceManager::new(ResourceManagerConfig::default()).into(),
        CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        RecoveryRegistry::new(300).into(),
        EventBus::new(),
    );
    coordinator.sync_immediate(a.id, SyncOpKind::Create).await.expect("sync a");
    coordinator.sync_immediate(b.id, SyncOpKind::Create).await.expect("sync b");

    let analyzer = GraphAnalyzer::new(graph);
    let analysis = analyzer.analyze(a.id).await.expect("analyze a");
    assert!(analysis.cycle.is_some(), "mutual DependsOn edges should form a cycle back to a");

    let full = analyzer.full_cycle_check().await.expect("full cycle check");
    assert!(full.is_some());
}

#[tokio::test]
async fn linear_dependency_chain_has_no_cycle() {
    let relational = common::relational_store().await;
    let vector = common::vector_store();
    let graph = common::graph_store();

    let a = common::sample_task("A");
    let mut b = common::sample_task("B");
    b.add_relation(RelationKind::DependsOn, a.id);
    relational.insert_task(&a).await.expect("insert a");
    relational.insert_task(&b).await.expect("insert b");

    let coordinator = SyncCoordinator::new(
        relational.clone(),
        vector,
        graph.clone(),
        ResourceManager::new(ResourceManagerConfig::default()).into(),
        CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        RecoveryRegistry::new(300).into(),
        EventBus::new(),
    );
    coordinator.sync_immediate(a.id, SyncOpKind::Create).await.expect("sync a");
    coordinator.sync_immediate(b.id, SyncOpKind::Create).await.expect("sync b");

    let analyzer = GraphAnalyzer::new(graph);
    let analysis = analyzer.analyze(b.id).await.expect("analyze b");
    assert_eq!(analysis.dependencies, vec![a.id]);
    assert!(analysis.cycle.is_none());

    let full = analyzer.full_cycle_check().await.expect("full cycle check");
    assert!(full.is_none());
}
