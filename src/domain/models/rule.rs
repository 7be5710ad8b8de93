//! Auto-append rule model (spec §3, §4.8).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::condition::ConditionNode;
use super::event::EventKind;
use super::task::TaskPriority;

/// Lifecycle status of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
    Suspended,
    Error,
}

/// A template for directly constructing a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub title: String,
    pub description: String,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<String>,
    pub parent_id: Option<Uuid>,
    pub depends_on: Vec<Uuid>,
    pub tags: Vec<String>,
}

/// How a matching rule creates its new task (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreationRecipe {
    /// Build a task directly from an embedded template.
    Direct { template: TaskTemplate },
    /// Resolve a named template and substitute parameters into it.
    Template {
        template_id: String,
        parameters: HashMap<String, Value>,
    },
    /// Duplicate the content-bearing fields of a referenced task.
    Clone { source_task_id: Uuid },
}

/// A declarative (event-trigger, condition, creation-recipe) triple (spec
/// §3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub trigger_kinds: Vec<EventKind>,
    pub condition: ConditionNode,
    pub recipe: CreationRecipe,
    pub priority: i32,
    pub max_executions: Option<u32>,
    pub cooldown_minutes: u32,
    pub execution_count: u32,
    pub last_execution: Option<DateTime<Utc>>,
    pub status: RuleStatus,
    pub creator: String,
    pub last_error: Option<String>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        trigger_kinds: Vec<EventKind>,
        condition: ConditionNode,
        recipe: CreationRecipe,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger_kinds,
            condition,
            recipe,
            priority: 100,
            max_executions: None,
            cooldown_minutes: 0,
            execution_count: 0,
            last_execution: None,
            status: RuleStatus::Active,
            creator: "system".to_string(),
            last_error: None,
        }
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.trigger_kinds.contains(&kind)
    }

    /// Whether the rule is still within its cooldown window relative to
    /// `now` (spec §4.8, testable property 5).
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        if self.cooldown_minutes == 0 {
            return false;
        }
        match self.last_execution {
            Some(last) => now - last < chrono::Duration::minutes(self.cooldown_minutes as i64),
            None => false,
        }
    }

    pub fn execution_cap_reached(&self) -> bool {
        matches!(self.max_executions, Some(max) if self.execution_count >= max)
    }

    pub fn record_execution(&mut self, now: DateTime<Utc>) {
        self.execution_count += 1;
        self.last_execution = Some(now);
        if self.execution_cap_reached() {
            self.status = RuleStatus::Suspended;
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.status = RuleStatus::Error;
        self.last_error = Some(message.into());
    }
}
