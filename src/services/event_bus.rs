//! Publish/subscribe event bus (spec §4.4, C7).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::domain::models::event::{EventKind, TaskEvent};

/// A durable event consumer. Implementors should not panic; a panic is
/// caught at the dispatch boundary and only kills that listener's queue.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn handle(&self, event: TaskEvent);
}

struct Subscription {
    id: String,
    sender: mpsc::UnboundedSender<TaskEvent>,
}

/// Bounded-history pub/sub bus. Each subscriber gets its own queue and
/// consumer task, so one slow or failing listener cannot block delivery
/// to the others, while still seeing its own events in publish order
/// (spec §4.4).
pub struct EventBus {
    history: RwLock<VecDeque<TaskEvent>>,
    history_cap: usize,
    subscribers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(history_cap: usize) -> Arc<Self> {
        Arc::new(Self {
            history: RwLock::new(VecDeque::with_capacity(history_cap.min(1024))),
            history_cap,
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    /// Subscribe `listener` to `kind` under `id`. Re-subscribing the same
    /// `id` for the same kind is a no-op (spec §4.4's idempotent
    /// subscription requirement).
    pub async fn subscribe(&self, kind: EventKind, id: impl Into<String>, listener: Arc<dyn EventListener>) {
        let id = id.into();
        let mut subscribers = self.subscribers.write().await;
        let entries = subscribers.entry(kind).or_default();
        if entries.iter().any(|s| s.id == id) {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();
        let task_listener = listener.clone();
        let listener_id = id.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let fut = task_listener.handle(event);
                if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    warn!(listener = %listener_id, ?panic, "event listener panicked");
                }
            }
        });

        entries.push(Subscription { id, sender: tx });
    }

    pub async fn unsubscribe(&self, kind: EventKind, id: &str) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(entries) = subscribers.get_mut(&kind) {
            entries.retain(|s| s.id != id);
        }
    }

    /// Record the event in the bounded history, then fan it out to every
    /// subscriber of its kind. Delivery to each subscriber's queue is
    /// independent; a full or dropped queue never blocks the publisher.
    pub async fn publish(&self, event: TaskEvent) {
        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.history_cap {
                history.pop_front();
            }
        }

        let subscribers = self.subscribers.read().await;
        if let Some(entries) = subscribers.get(&event.kind) {
            for subscription in entries {
                if subscription.sender.send(event.clone()).is_err() {
                    warn!(listener = %subscription.id, "event listener queue closed");
                }
            }
        }
    }

    /// Query recorded history, most recent last, filtered by kind and/or
    /// task id and capped to `limit` entries (spec §4.4).
    pub async fn history(&self, kind: Option<EventKind>, task_id: Option<uuid::Uuid>, limit: usize) -> Vec<TaskEvent> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|e| kind.map(|k| k == e.kind).unwrap_or(true))
            .filter(|e| task_id.map(|t| t == e.task_id).unwrap_or(true))
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingListener(Arc<AtomicUsize>);

    #[async_trait]
    impl EventListener for CountingListener {
        async fn handle(&self, _event: TaskEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn delivers_to_matching_kind_only() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Completed, "counter", Arc::new(CountingListener(count.clone())))
            .await;

        bus.publish(TaskEvent::new(EventKind::Created, Uuid::new_v4(), "test")).await;
        bus.publish(TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test")).await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_is_bounded_and_filterable() {
        let bus = EventBus::with_capacity(3);
        let task_id = Uuid::new_v4();
        for _ in 0..5 {
            bus.publish(TaskEvent::new(EventKind::Created, task_id, "test")).await;
        }
        let history = bus.history(None, None, 10).await;
        assert_eq!(history.len(), 3);

        let filtered = bus.history(Some(EventKind::Completed), None, 10).await;
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn resubscribing_same_id_is_idempotent() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Created, "dup", Arc::new(CountingListener(count.clone())))
            .await;
        bus.subscribe(EventKind::Created, "dup", Arc::new(CountingListener(count.clone())))
            .await;

        bus.publish(TaskEvent::new(EventKind::Created, Uuid::new_v4(), "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
