//! Background service operation model (spec §3, §4.6).

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which background service an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    AutoEmbedding,
    CycleDetection,
    IncrementalSync,
    IndexOptimization,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoEmbedding => "auto_embedding",
            Self::CycleDetection => "cycle_detection",
            Self::IncrementalSync => "incremental_sync",
            Self::IndexOptimization => "index_optimization",
        }
    }
}

/// Priority ordering for the service manager's shared queue: lower value
/// drains first (spec §4.6: `critical < high < normal < low`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

/// A unit of work on the background service queue (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOperation {
    pub id: Uuid,
    pub service: ServiceKind,
    pub operation_kind: String,
    pub target_id: Uuid,
    pub payload: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub priority: OperationPriority,
}

impl ServiceOperation {
    pub fn new(service: ServiceKind, operation_kind: impl Into<String>, target_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            service,
            operation_kind: operation_kind.into(),
            target_id,
            payload: HashMap::new(),
            created_at: Utc::now(),
            scheduled_for: None,
            retry_count: 0,
            max_retries: 3,
            last_error: None,
            priority: OperationPriority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: OperationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn delayed_until(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// `min(2^retry_count, cap_seconds)`, the backoff formula shared by
    /// the sync coordinator and the service manager (spec §4.5, §4.6).
    pub fn backoff_seconds(&self, cap_seconds: u64) -> u64 {
        2u64.saturating_pow(self.retry_count).min(cap_seconds)
    }
}

/// Priority-queue ordering: `(priority, creation_time)` ascending, so a
/// `BinaryHeap` (max-heap) needs this reversed — see
/// [`crate::services::service_manager`].
impl PartialEq for ServiceOperation {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.created_at == other.created_at
    }
}
impl Eq for ServiceOperation {}

impl PartialOrd for ServiceOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}
