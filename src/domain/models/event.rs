//! Task lifecycle events (spec §3, §4.4).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The closed set of task lifecycle event kinds (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Completed,
    Failed,
    Cancelled,
    StatusChanged,
    Assigned,
    DeadlineApproaching,
    Overdue,
    MilestoneReached,
    ErrorThresholdExceeded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::DeadlineApproaching => "deadline_approaching",
            Self::Overdue => "overdue",
            Self::MilestoneReached => "milestone_reached",
            Self::ErrorThresholdExceeded => "error_threshold_exceeded",
        }
    }
}

/// An immutable record of something that happened to a task (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: HashMap<String, Value>,
    pub source: String,
    pub correlation_id: Option<Uuid>,
}

impl TaskEvent {
    pub fn new(kind: EventKind, task_id: Uuid, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            task_id,
            timestamp: Utc::now(),
            data: HashMap::new(),
            source: source.into(),
            correlation_id: None,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Resolve a dotted field path against `event_data.<field>` or the
    /// event's own top-level fields (e.g. `event_type`). Used by the
    /// condition evaluator (spec §4.3).
    pub fn resolve_field(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("event_data.") {
            return self.data.get(rest).cloned();
        }
        match path {
            "event_type" => Some(Value::String(self.kind.as_str().to_string())),
            "task_id" => Some(Value::String(self.task_id.to_string())),
            "source" => Some(Value::String(self.source.clone())),
            _ => None,
        }
    }
}
