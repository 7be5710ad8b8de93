//! Cross-cutting and domain services (spec §4, components C1-C11).

pub mod background;
pub mod circuit_breaker;
pub mod condition_evaluator;
pub mod event_bus;
pub mod graph_analyzer;
pub mod recovery;
pub mod resource_manager;
pub mod rule_engine;
pub mod service_manager;
pub mod sync_coordinator;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
pub use condition_evaluator::ConditionEvaluator;
pub use event_bus::EventBus;
pub use graph_analyzer::GraphAnalyzer;
pub use recovery::RecoveryRegistry;
pub use resource_manager::{ResourceManager, ResourceManagerConfig};
pub use rule_engine::RuleEngine;
pub use service_manager::ServiceManager;
pub use sync_coordinator::{SyncCoordinator, SyncOpKind, SyncPriority, SyncTargets};
