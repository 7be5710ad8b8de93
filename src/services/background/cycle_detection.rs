//! Cycle-detection background service (spec §4.6, §4.7, C11).

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::domain::errors::{Store, TripleDbError};
use crate::domain::models::event::{EventKind, TaskEvent};
use crate::domain::models::service_operation::ServiceOperation;
use crate::services::event_bus::EventBus;
use crate::services::graph_analyzer::GraphAnalyzer;
use crate::services::service_manager::OperationHandler;

pub fn handler(analyzer: Arc<GraphAnalyzer>, event_bus: Arc<EventBus>) -> OperationHandler {
    Arc::new(move |op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
        let analyzer = analyzer.clone();
        let event_bus = event_bus.clone();
        Box::pin(async move {
            match op.operation_kind.as_str() {
                "check_cycles" => {
                    let analysis = analyzer
                        .analyze(op.target_id)
                        .await
                        .map_err(|e| TripleDbError::GraphOpFailed { message: e.to_string() })?;
                    if let Some(cycle) = analysis.cycle {
                        warn!(task_id = %op.target_id, ?cycle, "dependency cycle detected");
                        event_bus
                            .publish(TaskEvent::new(EventKind::ErrorThresholdExceeded, op.target_id, "cycle_detection"))
                            .await;
                    }
                    Ok(())
                }
                "full_cycle_check" => {
                    let cycle = analyzer
                        .full_cycle_check()
                        .await
                        .map_err(|e| TripleDbError::GraphOpFailed { message: e.to_string() })?;
                    if let Some(cycle) = cycle {
                        warn!(?cycle, "full-graph dependency cycle detected");
                    }
                    Ok(())
                }
                other => Err(TripleDbError::Base {
                    store: Store::Graph,
                    operation: "cycle_detection".to_string(),
                    message: format!("unknown operation: {other}"),
                }),
            }
        })
    })
}
