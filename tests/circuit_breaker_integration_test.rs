//! Circuit breaker state-machine test driven through the sync
//! coordinator's vector-store guard, using a vector store double that
//! always fails to force the circuit open.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tripledb_sync_core::domain::errors::{CoreResult, Store, TripleDbError};
use tripledb_sync_core::domain::ports::{VectorMetadata, VectorStore};
use tripledb_sync_core::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitCheck};

struct AlwaysFailingVectorStore {
    should_fail: AtomicBool,
}

impl AlwaysFailingVectorStore {
    fn new() -> Self {
        Self { should_fail: AtomicBool::new(true) }
    }
}

#[async_trait]
impl VectorStore for AlwaysFailingVectorStore {
    async fn upsert(&self, _doc_id: &str, _text: &str, _metadata: VectorMetadata) -> CoreResult<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(TripleDbError::connection_failed(Store::Vector, "simulated outage"))
        } else {
            Ok(())
        }
    }

    async fn delete(&self, _doc_id: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn get_collection(&self, _name: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn contains(&self, _doc_id: &str) -> CoreResult<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn circuit_opens_after_threshold_and_recovers_after_timeout() {
    let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold: 3,
        recovery_timeout: chrono::Duration::milliseconds(50),
    });
    let store = Arc::new(AlwaysFailingVectorStore::new());

    for _ in 0..3 {
        let store = store.clone();
        let _ = registry.guard(Store::Vector, || async move { store.upsert("d", "t", VectorMetadata::default()).await }).await;
    }

    assert!(matches!(registry.check(Store::Vector).await, CircuitCheck::Blocked));

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    assert!(matches!(registry.check(Store::Vector).await, CircuitCheck::Trial));

    store.should_fail.store(false, Ordering::SeqCst);
    let store_for_guard = store.clone();
    let result = registry
        .guard(Store::Vector, || async move { store_for_guard.upsert("d", "t", VectorMetadata::default()).await })
        .await;
    assert!(result.is_ok());
    assert!(matches!(registry.check(Store::Vector).await, CircuitCheck::Allowed));
}
