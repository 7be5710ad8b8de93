//! Auto-embedding background service (spec §4.6, C11).
//!
//! Embedding generation itself lives behind the vector store port; this
//! handler just drives the sync coordinator's vector-only projection
//! (spec §4.6: "upserts into the vector store... stamps vector-synced")
//! for the operation kinds the service manager dispatches to it. It
//! never touches the graph store.

use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::domain::errors::TripleDbError;
use crate::domain::models::service_operation::ServiceOperation;
use crate::services::service_manager::OperationHandler;
use crate::services::sync_coordinator::SyncCoordinator;

pub fn handler(coordinator: Arc<SyncCoordinator>) -> OperationHandler {
    Arc::new(move |op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
        let coordinator = coordinator.clone();
        Box::pin(async move {
            match op.operation_kind.as_str() {
                "embed_task" => coordinator.sync_vector_only(op.target_id).await,
                "batch_embed" => {
                    let ids = op
                        .payload
                        .get("task_ids")
                        .and_then(|v| v.as_array())
                        .cloned()
                        .unwrap_or_default();
                    for id in ids {
                        if let Some(task_id) = id.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                            coordinator.sync_vector_only(task_id).await?;
                        }
                    }
                    Ok(())
                }
                other => Err(TripleDbError::EmbeddingFailed {
                    message: format!("unknown operation: {other}"),
                }),
            }
        })
    })
}
