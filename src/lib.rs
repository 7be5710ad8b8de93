//! Task orchestration core keeping a relational, vector and graph store
//! eventually consistent (spec overview).

pub mod adapters;
pub mod context;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use context::Core;
pub use domain::errors::{ConfigError, CoreResult, Severity, Store, TripleDbError};
pub use infrastructure::Config;
