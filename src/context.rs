//! Wires the store adapters and cross-cutting services into one handle
//! (spec §9, replacing ambient singletons with explicit construction).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as ChronoDuration;

use crate::adapters::memory::{InMemoryGraphStore, InMemoryVectorStore};
use crate::adapters::sqlite::{create_pool, PoolConfig, SqliteRelationalStore};
use crate::domain::models::service_operation::ServiceKind;
use crate::domain::ports::graph_store::GraphStore;
use crate::domain::ports::relational_store::RelationalStore;
use crate::domain::ports::vector_store::VectorStore;
use crate::infrastructure::Config;
use crate::services::background;
use crate::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::services::event_bus::EventBus;
use crate::services::graph_analyzer::GraphAnalyzer;
use crate::services::recovery::RecoveryRegistry;
use crate::services::resource_manager::{ResourceManager, ResourceManagerConfig};
use crate::services::rule_engine::RuleEngine;
use crate::services::service_manager::ServiceManager;
use crate::services::sync_coordinator::SyncCoordinator;

/// Holds every shared service and adapter the core needs, built once at
/// startup and cloned (via internal `Arc`s) wherever it is used.
pub struct Core {
    pub relational: Arc<dyn RelationalStore>,
    pub vector: Arc<dyn VectorStore>,
    pub graph: Arc<dyn GraphStore>,
    pub resources: Arc<ResourceManager>,
    pub circuits: Arc<CircuitBreakerRegistry>,
    pub recovery: Arc<RecoveryRegistry>,
    pub event_bus: Arc<EventBus>,
    pub rule_engine: Arc<RuleEngine>,
    pub sync_coordinator: Arc<SyncCoordinator>,
    pub graph_analyzer: Arc<GraphAnalyzer>,
    pub service_manager: Arc<ServiceManager>,
}

impl Core {
    /// Builds the full service graph against a real SQLite relational
    /// store and the in-memory vector/graph stand-ins (spec §11.2).
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = create_pool(
            &config.database.path,
            Some(PoolConfig {
                max_connections: config.database.max_connections,
                ..PoolConfig::default()
            }),
        )
        .await?;
        crate::adapters::sqlite::Migrator::new(pool.clone()).run().await?;

        let relational: Arc<dyn RelationalStore> = Arc::new(SqliteRelationalStore::new(pool));
        let vector: Arc<dyn VectorStore> = InMemoryVectorStore::new();
        let graph: Arc<dyn GraphStore> = InMemoryGraphStore::new();

        Ok(Self::assemble(relational, vector, graph, config))
    }

    /// Builds the service graph over caller-supplied store adapters,
    /// used by integration tests that swap in in-memory doubles for all
    /// three stores.
    pub fn assemble(
        relational: Arc<dyn RelationalStore>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        config: &Config,
    ) -> Self {
        let resources = Arc::new(ResourceManager::new(ResourceManagerConfig {
            relational_cap: config.connection_cap_relational as u32,
            vector_cap: config.connection_cap_vector as u32,
            graph_cap: config.connection_cap_graph as u32,
            relational_timeout: Duration::from_secs(config.connection_timeout_relational),
            vector_timeout: Duration::from_secs(config.connection_timeout_vector),
            graph_timeout: Duration::from_secs(config.connection_timeout_graph),
        }));

        let circuits = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_failure_threshold,
            recovery_timeout: ChronoDuration::seconds(config.circuit_recovery_timeout_seconds as i64),
        });

        let recovery = Arc::new(RecoveryRegistry::new(config.error_history_window_seconds as u64));
        let event_bus = EventBus::new();

        let sync_coordinator = SyncCoordinator::with_embedding_max_content_length(
            relational.clone(),
            vector.clone(),
            graph.clone(),
            resources.clone(),
            circuits.clone(),
            recovery.clone(),
            event_bus.clone(),
            config.embedding_max_content_length,
        );

        let rule_engine = Arc::new(RuleEngine::new(relational.clone(), event_bus.clone(), sync_coordinator.clone()));

        let graph_analyzer = Arc::new(GraphAnalyzer::new(graph.clone()));
        let service_manager = ServiceManager::new(config.worker_count);

        Self {
            relational,
            vector,
            graph,
            resources,
            circuits,
            recovery,
            event_bus,
            rule_engine,
            sync_coordinator,
            graph_analyzer,
            service_manager,
        }
    }

    /// Registers the four background-service handlers and starts the
    /// sync coordinator's batcher and the service manager's worker pool.
    pub async fn start(&self) {
        self.service_manager
            .register_handler(
                ServiceKind::AutoEmbedding,
                background::embedding::handler(self.sync_coordinator.clone()),
            )
            .await;
        self.service_manager
            .register_handler(
                ServiceKind::CycleDetection,
                background::cycle_detection::handler(self.graph_analyzer.clone(), self.event_bus.clone()),
            )
            .await;
        self.service_manager
            .register_handler(
                ServiceKind::IncrementalSync,
                background::incremental_sync::handler(self.sync_coordinator.clone()),
            )
            .await;
        self.service_manager
            .register_handler(ServiceKind::IndexOptimization, background::index_optimization::handler())
            .await;

        self.sync_coordinator.start().await;
        self.service_manager.start().await;
    }

    /// Stops the batcher and worker pool, allowing in-flight operations
    /// to complete.
    pub async fn stop(&self) {
        self.sync_coordinator.stop().await;
        self.service_manager.stop().await;
    }

    /// Task-mutation entry point (spec §2): writes the task, publishes
    /// its `created` event on C7, and schedules a sync on C5. Every
    /// caller that creates a task — direct API use as well as the
    /// auto-append rule engine — goes through this path rather than
    /// calling the relational store directly.
    pub async fn create_task(&self, task: &crate::domain::models::Task) -> crate::domain::errors::CoreResult<()> {
        self.sync_coordinator.create_task(task).await
    }
}
