//! Auto-append rule engine (spec §4.8, C9).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::errors::{EvaluatorError, Store, TripleDbError};
use crate::domain::models::event::{EventKind, TaskEvent};
use crate::domain::models::rule::{CreationRecipe, Rule, RuleStatus};
use crate::domain::models::task::Task;
use crate::domain::ports::relational_store::RelationalStore;
use crate::services::condition_evaluator::ConditionEvaluator;
use crate::services::event_bus::{EventBus, EventListener};
use crate::services::sync_coordinator::SyncCoordinator;

/// Owns the rule registry, subscribes to the event bus for every kind at
/// least one active rule cares about, and dispatches matching rules'
/// creation recipes against the relational store (spec §4.8).
pub struct RuleEngine {
    inner: Arc<RuleEngineInner>,
}

struct RuleEngineInner {
    rules: RwLock<HashMap<Uuid, Rule>>,
    subscribed_kinds: RwLock<HashSet<EventKind>>,
    evaluator: ConditionEvaluator,
    store: Arc<dyn RelationalStore>,
    event_bus: Arc<EventBus>,
    sync_coordinator: Arc<SyncCoordinator>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn RelationalStore>, event_bus: Arc<EventBus>, sync_coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            inner: Arc::new(RuleEngineInner {
                rules: RwLock::new(HashMap::new()),
                subscribed_kinds: RwLock::new(HashSet::new()),
                evaluator: ConditionEvaluator::new(),
                store,
                event_bus,
                sync_coordinator,
            }),
        }
    }

    /// Validate and register a rule, subscribing to each of its trigger
    /// kinds on the event bus the first time that kind is seen.
    pub async fn add_rule(&self, rule: Rule) -> Result<(), EvaluatorError> {
        self.inner.evaluator.validate(&rule.condition)?;
        let kinds = rule.trigger_kinds.clone();
        self.inner.rules.write().await.insert(rule.id, rule);

        let mut subscribed = self.inner.subscribed_kinds.write().await;
        for kind in kinds {
            if subscribed.insert(kind) {
                let listener: Arc<dyn EventListener> = self.inner.clone();
                self.inner.event_bus.subscribe(kind, "rule_engine", listener).await;
            }
        }
        Ok(())
    }

    pub async fn remove_rule(&self, id: Uuid) {
        self.inner.rules.write().await.remove(&id);
    }

    pub async fn rules(&self) -> Vec<Rule> {
        self.inner.rules.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl EventListener for RuleEngineInner {
    async fn handle(&self, event: TaskEvent) {
        let now = Utc::now();
        let mut candidates: Vec<Rule> = {
            let rules = self.rules.read().await;
            rules
                .values()
                .filter(|r| r.status == RuleStatus::Active && r.handles(event.kind))
                .cloned()
                .collect()
        };
        candidates.sort_by_key(|r| r.priority);

        for rule in candidates {
            if rule.in_cooldown(now) || rule.execution_cap_reached() {
                continue;
            }

            let task_snapshot = if rule.condition.requires_task_snapshot() {
                match self.store.get_task(event.task_id).await {
                    Ok(task) => task,
                    Err(err) => {
                        warn!(rule = %rule.name, error = %err, "failed to load task snapshot for rule");
                        continue;
                    }
                }
            } else {
                None
            };

            if !self.evaluator.evaluate(&rule.condition, &event, task_snapshot.as_ref()) {
                continue;
            }

            match self.execute_recipe(&rule, task_snapshot.as_ref()).await {
                Ok(()) => self.record_execution(rule.id, now).await,
                Err(err) => {
                    error!(rule = %rule.name, error = %err, "auto-append rule execution failed");
                    self.record_error(rule.id, err.to_string()).await;
                }
            }
        }
    }
}

impl RuleEngineInner {
    async fn execute_recipe(&self, rule: &Rule, snapshot: Option<&Task>) -> Result<(), TripleDbError> {
        let new_task = match &rule.recipe {
            CreationRecipe::Direct { template } => {
                let mut task = Task::new(template.title.clone(), template.description.clone());
                if let Some(priority) = template.priority {
                    task.priority = priority;
                }
                if let Some(task_type) = &template.task_type {
                    task.task_type = task_type.clone();
                }
                task.parent_id = template.parent_id;
                task.metadata.tags = template.tags.clone();
                for dep in &template.depends_on {
                    task.add_relation(crate::domain::models::task::RelationKind::DependsOn, *dep);
                }
                task
            }
            CreationRecipe::Template { template_id, parameters } => {
                let title = parameters
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("auto: {template_id}"));
                let description = parameters
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Task::new(title, description)
            }
            CreationRecipe::Clone { source_task_id } => {
                let source = self
                    .store
                    .get_task(*source_task_id)
                    .await?
                    .ok_or_else(|| TripleDbError::sync_failed(Store::Relational, "clone source task not found"))?;
                let mut task = Task::new(source.title.clone(), source.description.clone());
                task.priority = source.priority;
                task.task_type = source.task_type.clone();
                task.metadata = source.metadata.clone();
                task
            }
        };

        let _ = snapshot;
        self.sync_coordinator.create_task(&new_task).await
    }

    async fn record_execution(&self, rule_id: Uuid, now: DateTime<Utc>) {
        if let Some(rule) = self.rules.write().await.get_mut(&rule_id) {
            rule.record_execution(now);
        }
    }

    async fn record_error(&self, rule_id: Uuid, message: String) {
        if let Some(rule) = self.rules.write().await.get_mut(&rule_id) {
            rule.record_error(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraphStore, InMemoryVectorStore};
    use crate::domain::models::condition::{ComparisonOperator, ConditionCategory, ConditionNode};
    use crate::domain::models::rule::TaskTemplate;
    use crate::domain::ports::relational_store::{TaskFilter, TaskPatch};
    use crate::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
    use crate::services::recovery::RecoveryRegistry;
    use crate::services::resource_manager::{ResourceManager, ResourceManagerConfig};
    use std::sync::Mutex as StdMutex;

    fn test_sync_coordinator(store: Arc<dyn RelationalStore>, bus: Arc<EventBus>) -> Arc<SyncCoordinator> {
        SyncCoordinator::new(
            store,
            InMemoryVectorStore::new(),
            InMemoryGraphStore::new(),
            Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            Arc::new(RecoveryRegistry::new(300)),
            bus,
        )
    }

    struct FakeRelationalStore {
        inserted: StdMutex<Vec<Task>>,
    }

    #[async_trait]
    impl RelationalStore for FakeRelationalStore {
        async fn get_task(&self, _id: Uuid) -> crate::domain::errors::CoreResult<Option<Task>> {
            Ok(None)
        }
        async fn list_tasks(&self, _filter: TaskFilter, _limit: usize) -> crate::domain::errors::CoreResult<Vec<Task>> {
            Ok(vec![])
        }
        async fn insert_task(&self, task: &Task) -> crate::domain::errors::CoreResult<()> {
            self.inserted.lock().unwrap().push(task.clone());
            Ok(())
        }
        async fn update_task(&self, _id: Uuid, _patch: TaskPatch) -> crate::domain::errors::CoreResult<()> {
            Ok(())
        }
        async fn delete_task(&self, _id: Uuid) -> crate::domain::errors::CoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn matching_rule_creates_task() {
        let store = Arc::new(FakeRelationalStore { inserted: StdMutex::new(vec![]) });
        let bus = EventBus::new();
        let sync_coordinator = test_sync_coordinator(store.clone(), bus.clone());
        let engine = RuleEngine::new(store.clone(), bus.clone(), sync_coordinator);

        let condition = ConditionNode::leaf(ConditionCategory::EventType, "event_type", ComparisonOperator::Equals, "completed");
        let recipe = CreationRecipe::Direct {
            template: TaskTemplate {
                title: "Follow up".into(),
                description: "auto-created".into(),
                ..Default::default()
            },
        };
        let rule = Rule::new("on-complete-followup", vec![EventKind::Completed], condition, recipe);
        engine.add_rule(rule).await.unwrap();

        bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn suspended_rule_after_cap_stops_firing() {
        let store = Arc::new(FakeRelationalStore { inserted: StdMutex::new(vec![]) });
        let bus = EventBus::new();
        let sync_coordinator = test_sync_coordinator(store.clone(), bus.clone());
        let engine = RuleEngine::new(store.clone(), bus.clone(), sync_coordinator);

        let condition = ConditionNode::leaf(ConditionCategory::EventType, "event_type", ComparisonOperator::Equals, "completed");
        let recipe = CreationRecipe::Direct {
            template: TaskTemplate {
                title: "Follow up".into(),
                description: "auto-created".into(),
                ..Default::default()
            },
        };
        let mut rule = Rule::new("capped", vec![EventKind::Completed], condition, recipe);
        rule.max_executions = Some(1);
        engine.add_rule(rule).await.unwrap();

        bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }
}
