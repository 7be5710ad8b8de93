//! Background-service worker pool (spec §4.6, C10).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::errors::TripleDbError;
use crate::domain::models::service_operation::{ServiceKind, ServiceOperation};

const TICK_INTERVAL_SECS: u64 = 1;
const SCHEDULER_INTERVAL_SECS: u64 = 10;
const MAX_RETRY_DELAY_SECS: u64 = 300;
const LATENCY_WINDOW: usize = 100;

pub type OperationHandler = Arc<dyn Fn(ServiceOperation) -> BoxFuture<'static, Result<(), TripleDbError>> + Send + Sync>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceMetrics {
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub last_op_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    recent_latencies_ms: VecDeque<u64>,
}

impl ServiceMetrics {
    fn record(&mut self, latency_ms: u64) {
        self.recent_latencies_ms.push_back(latency_ms);
        if self.recent_latencies_ms.len() > LATENCY_WINDOW {
            self.recent_latencies_ms.pop_front();
        }
    }

    /// Mean latency over up to the last [`LATENCY_WINDOW`] operations.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.recent_latencies_ms.is_empty() {
            return 0.0;
        }
        self.recent_latencies_ms.iter().sum::<u64>() as f64 / self.recent_latencies_ms.len() as f64
    }
}

/// A shared priority queue, a fixed worker pool, and a delayed-retry
/// scheduler for the four background services (spec §4.6).
pub struct ServiceManager {
    queue: Mutex<BinaryHeap<Reverse<ServiceOperation>>>,
    delayed: Mutex<Vec<ServiceOperation>>,
    handlers: RwLock<HashMap<ServiceKind, OperationHandler>>,
    metrics: RwLock<HashMap<ServiceKind, ServiceMetrics>>,
    worker_count: usize,
    running: AtomicBool,
    wake: Notify,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceManager {
    pub fn new(worker_count: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(BinaryHeap::new()),
            delayed: Mutex::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            worker_count: worker_count.max(1),
            running: AtomicBool::new(false),
            wake: Notify::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub async fn register_handler(&self, service: ServiceKind, handler: OperationHandler) {
        self.handlers.write().await.insert(service, handler);
    }

    /// Enqueue an operation. Operations carrying a future `scheduled_for`
    /// go to the delayed set; the 10s scheduler promotes them when due.
    pub async fn submit(&self, operation: ServiceOperation) {
        let due_later = operation.scheduled_for.map(|at| at > Utc::now()).unwrap_or(false);
        if due_later {
            self.delayed.lock().await.push(operation);
        } else {
            self.queue.lock().await.push(Reverse(operation));
            self.wake.notify_one();
        }
    }

    pub async fn metrics(&self, service: ServiceKind) -> ServiceMetrics {
        self.metrics.read().await.get(&service).cloned().unwrap_or_default()
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut tasks = self.tasks.lock().await;
        for _ in 0..self.worker_count {
            let manager = self.clone();
            tasks.push(tokio::spawn(async move { manager.worker_loop().await }));
        }
        let scheduler = self.clone();
        tasks.push(tokio::spawn(async move { scheduler.scheduler_loop().await }));
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    async fn worker_loop(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(TICK_INTERVAL_SECS));
        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }
            while let Some(operation) = self.pop_ready().await {
                self.execute(operation).await;
            }
        }
    }

    async fn pop_ready(&self) -> Option<ServiceOperation> {
        self.queue.lock().await.pop().map(|Reverse(op)| op)
    }

    async fn execute(&self, mut operation: ServiceOperation) {
        let handler = self.handlers.read().await.get(&operation.service).cloned();
        let Some(handler) = handler else {
            warn!(service = operation.service.as_str(), "no handler registered for service");
            return;
        };

        let service = operation.service;
        let started = std::time::Instant::now();
        let result = handler(operation.clone()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut metrics = self.metrics.write().await;
        let entry = metrics.entry(service).or_default();
        entry.record(latency_ms);
        entry.last_op_at = Some(Utc::now());

        match result {
            Ok(()) => {
                entry.completed += 1;
            }
            Err(err) => {
                drop(metrics);
                if operation.can_retry() {
                    operation.retry_count += 1;
                    operation.last_error = Some(err.to_string());
                    let delay = operation.backoff_seconds(MAX_RETRY_DELAY_SECS).max(1);
                    operation.scheduled_for = Some(Utc::now() + chrono::Duration::seconds(delay as i64));
                    warn!(service = service.as_str(), error = %err, retry = operation.retry_count, "operation failed, retrying");
                    self.metrics.write().await.entry(service).or_default().retried += 1;
                    self.delayed.lock().await.push(operation);
                } else {
                    error!(service = service.as_str(), error = %err, "operation failed, retries exhausted");
                    self.metrics.write().await.entry(service).or_default().failed += 1;
                }
            }
        }
    }

    async fn scheduler_loop(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(SCHEDULER_INTERVAL_SECS));
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let now = Utc::now();
            let mut delayed = self.delayed.lock().await;
            let (due, not_due): (Vec<_>, Vec<_>) = delayed
                .drain(..)
                .partition(|op| op.scheduled_for.map(|at| at <= now).unwrap_or(true));
            *delayed = not_due;
            drop(delayed);
            if !due.is_empty() {
                let mut queue = self.queue.lock().await;
                for op in due {
                    queue.push(Reverse(op));
                }
                drop(queue);
                self.wake.notify_one();
            }
        }
        info!("scheduler loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::service_operation::OperationPriority;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    #[tokio::test]
    async fn executes_submitted_operation() {
        let manager = ServiceManager::new(1);
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        manager
            .register_handler(
                ServiceKind::CycleDetection,
                Arc::new(move |_op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
                    let counted = counted.clone();
                    Box::pin(async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;

        manager.start().await;
        manager
            .submit(ServiceOperation::new(ServiceKind::CycleDetection, "check_cycles", Uuid::new_v4()))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        manager.stop().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        let metrics = manager.metrics(ServiceKind::CycleDetection).await;
        assert_eq!(metrics.completed, 1);
    }

    #[tokio::test]
    async fn higher_priority_operation_runs_first() {
        let manager = ServiceManager::new(1);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let recorded = order.clone();
        manager
            .register_handler(
                ServiceKind::IndexOptimization,
                Arc::new(move |op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
                    let recorded = recorded.clone();
                    Box::pin(async move {
                        recorded.lock().await.push(op.priority);
                        Ok(())
                    })
                }),
            )
            .await;

        manager
            .submit(
                ServiceOperation::new(ServiceKind::IndexOptimization, "optimize_indices", Uuid::new_v4())
                    .with_priority(OperationPriority::Low),
            )
            .await;
        manager
            .submit(
                ServiceOperation::new(ServiceKind::IndexOptimization, "optimize_indices", Uuid::new_v4())
                    .with_priority(OperationPriority::Critical),
            )
            .await;

        manager.start().await;
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        manager.stop().await;

        let seen = order.lock().await;
        assert_eq!(seen.first(), Some(&OperationPriority::Critical));
    }
}
