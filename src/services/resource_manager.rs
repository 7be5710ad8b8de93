//! Per-store connection budget (spec §4.2, C2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::domain::errors::Store;

struct StoreBudget {
    cap: u32,
    timeout: Duration,
    live: AtomicU32,
}

/// Tracks a live-handle counter against a configured cap per store, and
/// a per-store acquire timeout (spec §4.2, §6.4).
pub struct ResourceManager {
    budgets: HashMap<Store, StoreBudget>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceManagerConfig {
    pub relational_cap: u32,
    pub vector_cap: u32,
    pub graph_cap: u32,
    pub relational_timeout: Duration,
    pub vector_timeout: Duration,
    pub graph_timeout: Duration,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            relational_cap: 10,
            vector_cap: 5,
            graph_cap: 5,
            relational_timeout: Duration::from_secs(5),
            vector_timeout: Duration::from_secs(5),
            graph_timeout: Duration::from_secs(5),
        }
    }
}

impl ResourceManager {
    pub fn new(config: ResourceManagerConfig) -> Self {
        let mut budgets = HashMap::new();
        budgets.insert(
            Store::Relational,
            StoreBudget {
                cap: config.relational_cap,
                timeout: config.relational_timeout,
                live: AtomicU32::new(0),
            },
        );
        budgets.insert(
            Store::Vector,
            StoreBudget {
                cap: config.vector_cap,
                timeout: config.vector_timeout,
                live: AtomicU32::new(0),
            },
        );
        budgets.insert(
            Store::Graph,
            StoreBudget {
                cap: config.graph_cap,
                timeout: config.graph_timeout,
                live: AtomicU32::new(0),
            },
        );
        Self { budgets }
    }

    /// Atomically increments the live-handle counter if under cap.
    pub fn acquire(&self, store: Store) -> bool {
        let Some(budget) = self.budgets.get(&store) else {
            return true;
        };
        loop {
            let current = budget.live.load(Ordering::SeqCst);
            if current >= budget.cap {
                return false;
            }
            if budget
                .live
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Decrements the live-handle counter with a floor at 0.
    pub fn release(&self, store: Store) {
        let Some(budget) = self.budgets.get(&store) else {
            return;
        };
        let _ = budget
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(1)));
    }

    pub fn timeout(&self, store: Store) -> Duration {
        self.budgets.get(&store).map(|b| b.timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn in_use(&self, store: Store) -> u32 {
        self.budgets.get(&store).map(|b| b.live.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

/// RAII guard that releases the budget slot on drop, so a held permit
/// cannot leak across a `?` early return.
pub struct ResourceGuard<'a> {
    manager: &'a ResourceManager,
    store: Store,
}

impl<'a> ResourceGuard<'a> {
    /// Attempts to acquire a permit for `store`; returns `None` if the
    /// cap is currently exhausted (surfaces as a retriable
    /// `ConnectionFailed` at the call site per spec §4.2).
    pub fn try_acquire(manager: &'a ResourceManager, store: Store) -> Option<Self> {
        if manager.acquire(store) {
            Some(Self { manager, store })
        } else {
            None
        }
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_respects_cap() {
        let manager = ResourceManager::new(ResourceManagerConfig {
            vector_cap: 1,
            ..Default::default()
        });
        let first = ResourceGuard::try_acquire(&manager, Store::Vector);
        assert!(first.is_some());
        assert!(ResourceGuard::try_acquire(&manager, Store::Vector).is_none());
        drop(first);
        assert!(ResourceGuard::try_acquire(&manager, Store::Vector).is_some());
    }
}
