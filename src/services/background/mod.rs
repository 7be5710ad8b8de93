//! Handlers for the four background services dispatched by the
//! [`crate::services::service_manager::ServiceManager`] (spec §4.6, C11).

pub mod cycle_detection;
pub mod embedding;
pub mod incremental_sync;
pub mod index_optimization;
