//! Incremental-sync background service (spec §4.6, §4.5, C11).

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::domain::errors::{Store, TripleDbError};
use crate::domain::models::service_operation::ServiceOperation;
use crate::services::service_manager::OperationHandler;
use crate::services::sync_coordinator::{SyncCoordinator, SyncOpKind};

pub fn handler(coordinator: Arc<SyncCoordinator>) -> OperationHandler {
    Arc::new(move |op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
        let coordinator = coordinator.clone();
        Box::pin(async move {
            match op.operation_kind.as_str() {
                "sync_task" => coordinator.sync_immediate(op.target_id, SyncOpKind::Update).await,
                "cleanup_task" => coordinator.sync_immediate(op.target_id, SyncOpKind::Delete).await,
                "batch_sync" => coordinator.force_full_resync().await,
                other => Err(TripleDbError::Base {
                    store: Store::Relational,
                    operation: "incremental_sync".to_string(),
                    message: format!("unknown operation: {other}"),
                }),
            }
        })
    })
}
