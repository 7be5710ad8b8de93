//! Condition evaluator safety-limit tests: depth/leaf-count/regex-length
//! bounds and fail-closed evaluation against a real task snapshot.

mod common;

use tripledb_sync_core::domain::errors::EvaluatorError;
use tripledb_sync_core::domain::models::condition::{ComparisonOperator, ConditionCategory, ConditionNode};
use tripledb_sync_core::services::condition_evaluator::ConditionEvaluator;

fn status_equals(value: &str) -> ConditionNode {
    ConditionNode::leaf(ConditionCategory::TaskStatus, "status", ComparisonOperator::Equals, value)
}

#[test]
fn deeply_nested_tree_is_rejected() {
    let evaluator = ConditionEvaluator::new();
    let mut node = status_equals("pending");
    for _ in 0..25 {
        node = ConditionNode::and(vec![node]);
    }
    assert!(matches!(evaluator.validate(&node), Err(EvaluatorError::DepthExceeded(_, _))));
}

#[test]
fn too_many_leaves_is_rejected() {
    let evaluator = ConditionEvaluator::new();
    let leaves: Vec<_> = (0..51).map(|_| status_equals("pending")).collect();
    let node = ConditionNode::or(leaves);
    assert!(matches!(evaluator.validate(&node), Err(EvaluatorError::TooManyLeaves(_, _))));
}

#[test]
fn forbidden_field_path_is_rejected() {
    let evaluator = ConditionEvaluator::new();
    let node = ConditionNode::leaf(ConditionCategory::TaskProperty, "metadata.__class__", ComparisonOperator::Equals, "x");
    assert!(evaluator.validate(&node).is_err());
}

#[tokio::test]
async fn evaluation_against_real_task_matches_status() {
    let relational = common::relational_store().await;
    let task = common::sample_task("Evaluate me");
    relational.insert_task(&task).await.expect("insert task");

    let evaluator = ConditionEvaluator::new();
    let node = status_equals("pending");
    let event = common::created_event(&task);

    let stored = relational
        .get_task(task.id)
        .await
        .expect("get task")
        .expect("task exists");

    assert!(evaluator.evaluate(&node, &event, Some(&stored)));
}

#[tokio::test]
async fn missing_task_snapshot_fails_closed() {
    let task = common::sample_task("No snapshot");
    let evaluator = ConditionEvaluator::new();
    let node = status_equals("pending");
    let event = common::created_event(&task);

    assert!(!evaluator.evaluate(&node, &event, None));
}
