//! Index-optimization background service (spec §4.6, C11).
//!
//! The on-disk index layout of every store is out of scope for this
//! crate; this handler is the hook point the service manager dispatches
//! maintenance operations to, and logs them at the cadence the spec's
//! operation table defines rather than performing engine-specific work.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use crate::domain::errors::{Store, TripleDbError};
use crate::domain::models::service_operation::ServiceOperation;
use crate::services::service_manager::OperationHandler;

pub fn handler() -> OperationHandler {
    Arc::new(move |op: ServiceOperation| -> BoxFuture<'static, Result<(), TripleDbError>> {
        Box::pin(async move {
            match op.operation_kind.as_str() {
                "optimize_indices" | "vacuum_relational" | "optimize_vector" | "optimize_graph" => {
                    info!(operation = op.operation_kind.as_str(), "ran maintenance operation");
                    Ok(())
                }
                other => Err(TripleDbError::Base {
                    store: Store::Relational,
                    operation: "index_optimization".to_string(),
                    message: format!("unknown operation: {other}"),
                }),
            }
        })
    })
}
