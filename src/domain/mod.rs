//! Domain layer: models, ports and the error taxonomy. No I/O lives here.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ConfigError, CoreResult, ErrorRecord, EvaluatorError, Severity, Store, TripleDbError};
