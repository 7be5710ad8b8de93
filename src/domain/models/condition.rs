//! Condition tree types evaluated by [`crate::services::condition_evaluator`]
//! (spec §4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which namespace a leaf condition's field path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    TaskStatus,
    TaskType,
    SpecialistType,
    Complexity,
    EventType,
    TaskProperty,
    EventData,
    TimeBased,
    Custom,
}

impl ConditionCategory {
    /// Whether evaluating this category requires a task snapshot in
    /// addition to the triggering event (spec §4.8 step 2).
    pub fn requires_task_snapshot(&self) -> bool {
        matches!(
            self,
            Self::TaskStatus
                | Self::TaskType
                | Self::SpecialistType
                | Self::Complexity
                | Self::TaskProperty
        )
    }
}

/// Comparison operator applied between a resolved field value and an
/// expected value (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    InList,
    NotInList,
}

/// A single leaf condition: resolve `field` against the category's
/// namespace, then apply `operator` against `expected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafCondition {
    pub category: ConditionCategory,
    pub field: String,
    pub operator: ComparisonOperator,
    pub expected: Value,
}

/// Logical combinator for internal nodes (spec §4.3). `Not` must have
/// exactly one child; this is enforced by validation, not the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A node in a rule's condition tree: either a leaf or a logical
/// combination of child nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum ConditionNode {
    Leaf(LeafCondition),
    Logical {
        operator: LogicalOperator,
        children: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    pub fn leaf(category: ConditionCategory, field: impl Into<String>, operator: ComparisonOperator, expected: impl Into<Value>) -> Self {
        Self::Leaf(LeafCondition {
            category,
            field: field.into(),
            operator,
            expected: expected.into(),
        })
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::Logical {
            operator: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::Logical {
            operator: LogicalOperator::Or,
            children,
        }
    }

    pub fn not(child: ConditionNode) -> Self {
        Self::Logical {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    /// Maximum nesting depth of this tree (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Logical { children, .. } => {
                1 + children.iter().map(ConditionNode::depth).max().unwrap_or(0)
            }
        }
    }

    /// Total number of leaf conditions in this tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Logical { children, .. } => children.iter().map(ConditionNode::leaf_count).sum(),
        }
    }

    pub fn requires_task_snapshot(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.category.requires_task_snapshot(),
            Self::Logical { children, .. } => children.iter().any(ConditionNode::requires_task_snapshot),
        }
    }
}
