//! Error taxonomy for the triple-store sync core.
//!
//! Each error kind carries the affected store, the failing operation, a
//! human message, a severity, and an optional context map, per spec §4.1.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which downstream store an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    Relational,
    Vector,
    Graph,
}

impl Store {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Vector => "vector",
            Self::Graph => "graph",
        }
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of an error, used to drive logging level and degradation
/// detection (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The closed set of error kinds defined by spec §4.1.
#[derive(Debug, Error, Clone)]
pub enum TripleDbError {
    #[error("connection failed on {store}: {message}")]
    ConnectionFailed { store: Store, message: String },

    #[error("sync failed on {store}: {message}")]
    SyncFailed { store: Store, message: String },

    #[error("schema invalid on {store}: {message}")]
    SchemaInvalid { store: Store, message: String },

    #[error("embedding failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("graph operation failed: {message}")]
    GraphOpFailed { message: String },

    #[error("{store} error during {operation}: {message}")]
    Base {
        store: Store,
        operation: String,
        message: String,
    },
}

impl TripleDbError {
    pub fn connection_failed(store: Store, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            store,
            message: message.into(),
        }
    }

    pub fn sync_failed(store: Store, message: impl Into<String>) -> Self {
        Self::SyncFailed {
            store,
            message: message.into(),
        }
    }

    /// Affected store, if the variant carries one.
    pub fn store(&self) -> Option<Store> {
        match self {
            Self::ConnectionFailed { store, .. }
            | Self::SyncFailed { store, .. }
            | Self::SchemaInvalid { store, .. }
            | Self::Base { store, .. } => Some(*store),
            Self::EmbeddingFailed { .. } | Self::GraphOpFailed { .. } => None,
        }
    }

    /// Default severity for this kind, per spec §4.1 / §7's severity table.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::ConnectionFailed { .. } => Severity::High,
            Self::SyncFailed { .. } => Severity::Medium,
            Self::SchemaInvalid { .. } => Severity::High,
            Self::EmbeddingFailed { .. } => Severity::Medium,
            Self::GraphOpFailed { .. } => Severity::Medium,
            Self::Base { .. } => Severity::Medium,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// Schema-validation failures are fatal for the operation (spec §7);
    /// everything else is treated as retriable.
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::SchemaInvalid { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "ConnectionFailed",
            Self::SyncFailed { .. } => "SyncFailed",
            Self::SchemaInvalid { .. } => "SchemaInvalid",
            Self::EmbeddingFailed { .. } => "EmbeddingFailed",
            Self::GraphOpFailed { .. } => "GraphOpFailed",
            Self::Base { .. } => "TripleDbError",
        }
    }
}

/// A single recorded error, kept in the recovery registry's bounded
/// history for observability (spec §4.1).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub store: Option<Store>,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub context: HashMap<String, String>,
}

impl ErrorRecord {
    pub fn from_error(error: &TripleDbError, context: HashMap<String, String>) -> Self {
        Self {
            kind: error.kind_name().to_string(),
            store: error.store(),
            message: error.to_string(),
            severity: error.default_severity(),
            timestamp: Utc::now(),
            context,
        }
    }
}

/// Crate-level result alias for store/port operations.
pub type CoreResult<T> = Result<T, TripleDbError>;

/// Configuration and condition-evaluation errors, kept distinct from the
/// store-facing taxonomy above because they are rejected at registration
/// time rather than retried (spec §4.3, §10.3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker_count must be at least 1")]
    InvalidWorkerCount,

    #[error("sync_batch_size must be at least 1")]
    InvalidBatchSize,

    #[error("max_retries must be at least 1")]
    InvalidMaxRetries,

    #[error("connection cap for {0} must be at least 1")]
    InvalidConnectionCap(String),

    #[error("backoff_base must be greater than 1.0")]
    InvalidBackoffBase,

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("database max_connections must be at least 1")]
    InvalidMaxConnections,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("condition tree depth {0} exceeds the maximum of {1}")]
    DepthExceeded(usize, usize),

    #[error("condition tree has {0} leaves, exceeding the maximum of {1}")]
    TooManyLeaves(usize, usize),

    #[error("regex pattern length {0} exceeds the maximum of {1}")]
    RegexTooLong(usize, usize),

    #[error("invalid field path: {0}")]
    InvalidFieldPath(String),

    #[error("regex did not compile: {0}")]
    InvalidRegex(String),

    #[error("`not` node must have exactly one child, found {0}")]
    NotArity(usize),
}
