//! Error-recovery registry and degradation detection (spec §4.1, C1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::domain::errors::{ErrorRecord, Severity, TripleDbError};

/// A user-supplied recovery callable, keyed either by the exact error
/// kind name or by store (the "specific, then generic" lookup order of
/// spec §4.1).
pub type RecoveryFn = Arc<dyn Fn(&TripleDbError) -> bool + Send + Sync>;

#[derive(Default)]
struct Recoveries {
    by_kind: HashMap<String, RecoveryFn>,
    by_store: HashMap<String, RecoveryFn>,
}

/// Bounded in-memory error history plus the recovery lookup and
/// degradation flag described in spec §4.1.
pub struct RecoveryRegistry {
    history: RwLock<Vec<ErrorRecord>>,
    history_limit: usize,
    window: Duration,
    recoveries: RwLock<Recoveries>,
    degraded: AtomicBool,
}

impl RecoveryRegistry {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            history_limit: 1000,
            window: Duration::seconds(window_seconds as i64),
            recoveries: RwLock::new(Recoveries::default()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Register a recovery for a specific error kind (e.g. `"SyncFailed"`).
    pub async fn register_kind_recovery(&self, kind: impl Into<String>, recovery: RecoveryFn) {
        self.recoveries.write().await.by_kind.insert(kind.into(), recovery);
    }

    /// Register a generic per-store fallback recovery.
    pub async fn register_store_recovery(&self, store: impl Into<String>, recovery: RecoveryFn) {
        self.recoveries.write().await.by_store.insert(store.into(), recovery);
    }

    /// Record the error, attempt recovery (specific kind, then per-store
    /// fallback), recompute the degradation flag, and return whether
    /// recovery succeeded.
    pub async fn handle(&self, error: &TripleDbError, context: HashMap<String, String>) -> bool {
        let record = ErrorRecord::from_error(error, context);
        self.log(&record);

        {
            let mut history = self.history.write().await;
            history.push(record);
            if history.len() > self.history_limit {
                let excess = history.len() - self.history_limit;
                history.drain(0..excess);
            }
        }

        self.recompute_degradation().await;

        let recoveries = self.recoveries.read().await;
        if let Some(recovery) = recoveries.by_kind.get(error.kind_name()) {
            return recovery(error);
        }
        if let Some(store) = error.store() {
            if let Some(recovery) = recoveries.by_store.get(store.as_str()) {
                return recovery(error);
            }
        }
        false
    }

    fn log(&self, record: &ErrorRecord) {
        match record.severity {
            Severity::Low => info!(kind = %record.kind, message = %record.message, "recoverable error"),
            Severity::Medium => warn!(kind = %record.kind, message = %record.message, "recoverable error"),
            Severity::High | Severity::Critical => {
                error!(kind = %record.kind, message = %record.message, "recoverable error")
            }
        }
    }

    /// Degradation flips on when more than 10 errors, or more than 2
    /// critical errors, occurred in the trailing window; it clears when
    /// no errors occurred in a clean window (spec §4.1).
    async fn recompute_degradation(&self) {
        let cutoff = Utc::now() - self.window;
        let history = self.history.read().await;
        let recent: Vec<&ErrorRecord> = history.iter().filter(|r| r.timestamp > cutoff).collect();

        let critical_count = recent.iter().filter(|r| r.severity == Severity::Critical).count();
        let degraded = recent.len() > 10 || critical_count > 2;

        if degraded {
            self.degraded.store(true, Ordering::SeqCst);
        } else if recent.is_empty() {
            self.degraded.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub async fn history(&self) -> Vec<ErrorRecord> {
        self.history.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::Store;

    #[tokio::test]
    async fn degrades_after_ten_errors_in_window() {
        let registry = RecoveryRegistry::new(300);
        for _ in 0..11 {
            let err = TripleDbError::connection_failed(Store::Vector, "boom");
            registry.handle(&err, HashMap::new()).await;
        }
        assert!(registry.is_degraded());
    }

    #[tokio::test]
    async fn specific_recovery_takes_precedence_over_store_fallback() {
        let registry = RecoveryRegistry::new(300);
        registry
            .register_store_recovery("vector", Arc::new(|_| false))
            .await;
        registry
            .register_kind_recovery("SyncFailed", Arc::new(|_| true))
            .await;

        let err = TripleDbError::sync_failed(Store::Vector, "boom");
        assert!(registry.handle(&err, HashMap::new()).await);
    }
}
