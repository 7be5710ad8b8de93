//! Rule engine integration test: a rule fired through the real event bus
//! against a real SQLite relational store, including cooldown gating.

mod common;

use uuid::Uuid;

use tripledb_sync_core::domain::models::condition::{ComparisonOperator, ConditionCategory, ConditionNode};
use tripledb_sync_core::domain::models::rule::{CreationRecipe, Rule, TaskTemplate};
use tripledb_sync_core::domain::models::{EventKind, TaskEvent};
use tripledb_sync_core::domain::ports::relational_store::TaskFilter;
use tripledb_sync_core::domain::ports::RelationalStore;
use tripledb_sync_core::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use tripledb_sync_core::services::event_bus::EventBus;
use tripledb_sync_core::services::recovery::RecoveryRegistry;
use tripledb_sync_core::services::resource_manager::{ResourceManager, ResourceManagerConfig};
use tripledb_sync_core::services::rule_engine::RuleEngine;
use tripledb_sync_core::services::sync_coordinator::SyncCoordinator;

fn test_sync_coordinator(
    relational: std::sync::Arc<dyn RelationalStore>,
    event_bus: std::sync::Arc<EventBus>,
) -> std::sync::Arc<SyncCoordinator> {
    SyncCoordinator::new(
        relational,
        common::vector_store(),
        common::graph_store(),
        ResourceManager::new(ResourceManagerConfig::default()).into(),
        CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        RecoveryRegistry::new(300).into(),
        event_bus,
    )
}

fn follow_up_rule(cooldown_minutes: u32) -> Rule {
    let condition = ConditionNode::leaf(
        ConditionCategory::EventType,
        "event_type",
        ComparisonOperator::Equals,
        "completed",
    );
    let recipe = CreationRecipe::Direct {
        template: TaskTemplate {
            title: "Follow up".into(),
            description: "auto-created by rule".into(),
            ..Default::default()
        },
    };
    let mut rule = Rule::new("on-complete-followup", vec![EventKind::Completed], condition, recipe);
    rule.cooldown_minutes = cooldown_minutes;
    rule
}

#[tokio::test]
async fn matching_rule_inserts_a_task_into_the_relational_store() {
    let relational = common::relational_store().await;
    let bus = EventBus::new();
    let sync_coordinator = test_sync_coordinator(relational.clone(), bus.clone());
    let engine = RuleEngine::new(relational.clone(), bus.clone(), sync_coordinator);
    engine.add_rule(follow_up_rule(0)).await.expect("add rule");

    bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let tasks = relational.list_tasks(TaskFilter::default(), 10).await.expect("list tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Follow up");
}

#[tokio::test]
async fn cooldown_suppresses_a_second_trigger_within_the_window() {
    let relational = common::relational_store().await;
    let bus = EventBus::new();
    let sync_coordinator = test_sync_coordinator(relational.clone(), bus.clone());
    let engine = RuleEngine::new(relational.clone(), bus.clone(), sync_coordinator);
    engine.add_rule(follow_up_rule(60)).await.expect("add rule");

    bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let tasks = relational.list_tasks(TaskFilter::default(), 10).await.expect("list tasks");
    assert_eq!(tasks.len(), 1, "second event should be suppressed by the 60-minute cooldown");
}
