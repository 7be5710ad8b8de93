//! Condition tree evaluator (spec §4.3, C8).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::Utc;
use lru::LruCache;
use regex::Regex;
use serde_json::Value;

use crate::domain::errors::EvaluatorError;
use crate::domain::models::condition::{ComparisonOperator, ConditionCategory, ConditionNode, LeafCondition, LogicalOperator};
use crate::domain::models::event::TaskEvent;
use crate::domain::models::task::Task;

const MAX_DEPTH: usize = 20;
const MAX_LEAVES: usize = 50;
const MAX_REGEX_LEN: usize = 1000;
const REGEX_CACHE_SIZE: usize = 100;

/// Validates and evaluates condition trees against an incoming event and
/// an optional task snapshot (spec §4.3, §4.8).
pub struct ConditionEvaluator {
    regex_cache: Mutex<LruCache<String, Regex>>,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self {
            regex_cache: Mutex::new(LruCache::new(NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap())),
        }
    }

    /// Structural, field-path and regex validation performed once at
    /// rule registration time. Evaluation-time failures are handled
    /// separately by failing closed, not by rejecting the rule.
    pub fn validate(&self, root: &ConditionNode) -> Result<(), EvaluatorError> {
        let depth = root.depth();
        if depth > MAX_DEPTH {
            return Err(EvaluatorError::DepthExceeded(depth, MAX_DEPTH));
        }
        let leaves = root.leaf_count();
        if leaves > MAX_LEAVES {
            return Err(EvaluatorError::TooManyLeaves(leaves, MAX_LEAVES));
        }
        self.validate_node(root)
    }

    fn validate_node(&self, node: &ConditionNode) -> Result<(), EvaluatorError> {
        match node {
            ConditionNode::Leaf(leaf) => {
                validate_field_path(&leaf.field)?;
                if leaf.operator == ComparisonOperator::MatchesRegex {
                    let pattern = leaf
                        .expected
                        .as_str()
                        .ok_or_else(|| EvaluatorError::InvalidRegex("expected value must be a string".into()))?;
                    if pattern.len() > MAX_REGEX_LEN {
                        return Err(EvaluatorError::RegexTooLong(pattern.len(), MAX_REGEX_LEN));
                    }
                    Regex::new(pattern).map_err(|e| EvaluatorError::InvalidRegex(e.to_string()))?;
                }
                Ok(())
            }
            ConditionNode::Logical { operator, children } => {
                if *operator == LogicalOperator::Not && children.len() != 1 {
                    return Err(EvaluatorError::NotArity(children.len()));
                }
                for child in children {
                    self.validate_node(child)?;
                }
                Ok(())
            }
        }
    }

    /// Evaluate the tree against `event` and an optional `task` snapshot.
    /// A leaf whose field cannot be resolved evaluates to `false` rather
    /// than propagating an error (spec §4.3's fail-closed rule); tree-level
    /// limits are assumed already enforced by [`Self::validate`].
    pub fn evaluate(&self, root: &ConditionNode, event: &TaskEvent, task: Option<&Task>) -> bool {
        self.evaluate_node(root, event, task)
    }

    fn evaluate_node(&self, node: &ConditionNode, event: &TaskEvent, task: Option<&Task>) -> bool {
        match node {
            ConditionNode::Leaf(leaf) => self.evaluate_leaf(leaf, event, task),
            ConditionNode::Logical { operator, children } => match operator {
                LogicalOperator::And => children.iter().all(|c| self.evaluate_node(c, event, task)),
                LogicalOperator::Or => children.iter().any(|c| self.evaluate_node(c, event, task)),
                LogicalOperator::Not => children
                    .first()
                    .map(|c| !self.evaluate_node(c, event, task))
                    .unwrap_or(false),
            },
        }
    }

    fn evaluate_leaf(&self, leaf: &LeafCondition, event: &TaskEvent, task: Option<&Task>) -> bool {
        let Some(actual) = resolve_field(leaf.category, &leaf.field, event, task) else {
            return false;
        };
        self.compare(&actual, leaf.operator, &leaf.expected)
    }

    fn compare(&self, actual: &Value, operator: ComparisonOperator, expected: &Value) -> bool {
        use ComparisonOperator::*;
        match operator {
            Equals => actual == expected,
            NotEquals => actual != expected,
            Contains => text_pair(actual, expected).map(|(a, e)| a.contains(&e)).unwrap_or(false),
            NotContains => !text_pair(actual, expected).map(|(a, e)| a.contains(&e)).unwrap_or(false),
            StartsWith => text_pair(actual, expected).map(|(a, e)| a.starts_with(&e)).unwrap_or(false),
            EndsWith => text_pair(actual, expected).map(|(a, e)| a.ends_with(&e)).unwrap_or(false),
            MatchesRegex => match (as_text(actual), expected.as_str()) {
                (Some(text), Some(pattern)) => self.regex_is_match(pattern, &text),
                _ => false,
            },
            GreaterThan => numeric_value(actual) > numeric_value(expected),
            LessThan => numeric_value(actual) < numeric_value(expected),
            GreaterEqual => numeric_value(actual) >= numeric_value(expected),
            LessEqual => numeric_value(actual) <= numeric_value(expected),
            InList => expected.as_array().map(|items| items.contains(actual)).unwrap_or(false),
            NotInList => !expected.as_array().map(|items| items.contains(actual)).unwrap_or(false),
        }
    }

    fn regex_is_match(&self, pattern: &str, text: &str) -> bool {
        if pattern.len() > MAX_REGEX_LEN {
            return false;
        }
        let mut cache = self.regex_cache.lock().expect("regex cache poisoned");
        if let Some(re) = cache.get(pattern) {
            return re.is_match(text);
        }
        match Regex::new(pattern) {
            Ok(re) => {
                let matched = re.is_match(text);
                cache.put(pattern.to_string(), re);
                matched
            }
            Err(_) => false,
        }
    }
}

/// `^[A-Za-z_][A-Za-z0-9_.]*$` plus a denylist of substrings that would
/// otherwise let a field path masquerade as code (spec §4.3).
fn validate_field_path(field: &str) -> Result<(), EvaluatorError> {
    let starts_ok = field
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let chars_ok = field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    let forbidden = ["__", "eval", "exec", "import"];
    if !starts_ok || !chars_ok || forbidden.iter().any(|bad| field.contains(bad)) {
        return Err(EvaluatorError::InvalidFieldPath(field.to_string()));
    }
    Ok(())
}

fn resolve_field(category: ConditionCategory, field: &str, event: &TaskEvent, task: Option<&Task>) -> Option<Value> {
    use ConditionCategory::*;
    match category {
        EventType => Some(Value::String(event.kind.as_str().to_string())),
        EventData => event.data.get(field).cloned(),
        TaskStatus => task.and_then(|t| serde_json::to_value(t.status).ok()),
        TaskType => task.map(|t| Value::String(t.task_type.clone())),
        SpecialistType => task.and_then(|t| t.assignee.clone()).map(Value::String),
        Complexity => task.and_then(|t| t.metadata.complexity).and_then(|c| serde_json::to_value(c).ok()),
        TaskProperty => task.and_then(|t| resolve_task_property(t, field)),
        TimeBased => resolve_time_based(field, event, task),
        Custom => event.resolve_field(field).or_else(|| task.and_then(|t| resolve_task_property(t, field))),
    }
}

fn resolve_task_property(task: &Task, field: &str) -> Option<Value> {
    let root = serde_json::to_value(task).ok()?;
    let mut current = &root;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

fn resolve_time_based(field: &str, event: &TaskEvent, task: Option<&Task>) -> Option<Value> {
    let now = Utc::now();
    match field {
        "hours_since_created" => task.map(|t| Value::from((now - t.created_at).num_seconds() as f64 / 3600.0)),
        "hours_since_updated" => task.map(|t| Value::from((now - t.updated_at).num_seconds() as f64 / 3600.0)),
        "hours_since_event" => Some(Value::from((now - event.timestamp).num_seconds() as f64 / 3600.0)),
        "hours_until_due" => task.and_then(|t| t.due_at).map(|due| Value::from((due - now).num_seconds() as f64 / 3600.0)),
        "is_overdue" => task.and_then(|t| t.due_at).map(|due| Value::from(due < now)),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_pair(a: &Value, b: &Value) -> Option<(String, String)> {
    as_text(a).zip(as_text(b))
}

/// Numeric coercion used by ordering comparisons: missing/null values
/// coerce to `0.0` rather than short-circuiting the comparison (spec §4.3).
fn numeric_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Null => 0.0,
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Bool(b) => if *b { 1.0 } else { 0.0 },
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::EventKind;
    use uuid::Uuid;

    fn event() -> TaskEvent {
        TaskEvent::new(EventKind::Completed, Uuid::new_v4(), "test").with_data("score", 9)
    }

    #[test]
    fn equals_leaf_matches_task_status() {
        let evaluator = ConditionEvaluator::new();
        let task = Task::new("a", "b");
        let node = ConditionNode::leaf(ConditionCategory::TaskStatus, "status", ComparisonOperator::Equals, "pending");
        assert!(evaluator.evaluate(&node, &event(), Some(&task)));
    }

    #[test]
    fn missing_task_fails_closed() {
        let evaluator = ConditionEvaluator::new();
        let node = ConditionNode::leaf(ConditionCategory::TaskStatus, "status", ComparisonOperator::Equals, "pending");
        assert!(!evaluator.evaluate(&node, &event(), None));
    }

    #[test]
    fn numeric_comparison_coerces_missing_to_zero() {
        let evaluator = ConditionEvaluator::new();
        let node = ConditionNode::leaf(ConditionCategory::EventData, "missing_field", ComparisonOperator::LessEqual, 0);
        assert!(evaluator.evaluate(&node, &event(), None));
    }

    #[test]
    fn rejects_field_path_with_forbidden_substring() {
        let evaluator = ConditionEvaluator::new();
        let node = ConditionNode::leaf(ConditionCategory::EventData, "__import_system", ComparisonOperator::Equals, "x");
        assert!(evaluator.validate(&node).is_err());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let evaluator = ConditionEvaluator::new();
        let mut node = ConditionNode::leaf(ConditionCategory::EventType, "event_type", ComparisonOperator::Equals, "completed");
        for _ in 0..MAX_DEPTH {
            node = ConditionNode::and(vec![node]);
        }
        assert!(evaluator.validate(&node).is_err());
    }

    #[test]
    fn regex_matches_are_cached() {
        let evaluator = ConditionEvaluator::new();
        let node = ConditionNode::leaf(ConditionCategory::EventType, "event_type", ComparisonOperator::MatchesRegex, "^comp.*");
        assert!(evaluator.evaluate(&node, &event(), None));
        assert!(evaluator.evaluate(&node, &event(), None));
        assert_eq!(evaluator.regex_cache.lock().unwrap().len(), 1);
    }
}
