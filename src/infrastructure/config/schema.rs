//! Configuration schema (spec §6.4, §10.3).

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LoggingConfig;

/// Process-wide configuration for the sync core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Size of the service-manager worker pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Max operations per sync batch.
    #[serde(default = "default_sync_batch_size")]
    pub sync_batch_size: usize,

    /// Max wait, in seconds, to fill a sync batch before flushing anyway.
    #[serde(default = "default_sync_batch_timeout_seconds")]
    pub sync_batch_timeout_seconds: u64,

    /// Per-operation retry cap shared by the sync coordinator and service manager.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base, seconds; actual delay is `min(base^retry, 60)`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u64,

    /// Truncation threshold for embedding content.
    #[serde(default = "default_embedding_max_content_length")]
    pub embedding_max_content_length: usize,

    /// Consecutive failures before a store's circuit breaker opens.
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    /// Seconds an open circuit stays open before allowing a trial call.
    #[serde(default = "default_circuit_recovery_timeout_seconds")]
    pub circuit_recovery_timeout_seconds: u64,

    /// Concurrent-handle cap for the relational store.
    #[serde(default = "default_connection_cap_relational")]
    pub connection_cap_relational: usize,
    /// Concurrent-handle cap for the vector store.
    #[serde(default = "default_connection_cap_vector")]
    pub connection_cap_vector: usize,
    /// Concurrent-handle cap for the graph store.
    #[serde(default = "default_connection_cap_graph")]
    pub connection_cap_graph: usize,

    /// Acquire timeout, seconds, for the relational store.
    #[serde(default = "default_connection_timeout_relational")]
    pub connection_timeout_relational: u64,
    /// Acquire timeout, seconds, for the vector store.
    #[serde(default = "default_connection_timeout_vector")]
    pub connection_timeout_vector: u64,
    /// Acquire timeout, seconds, for the graph store.
    #[serde(default = "default_connection_timeout_graph")]
    pub connection_timeout_graph: u64,

    /// Rolling window, seconds, the recovery registry uses for degradation detection.
    #[serde(default = "default_error_history_window_seconds")]
    pub error_history_window_seconds: i64,

    /// Hours between scheduled index-optimization runs.
    #[serde(default = "default_optimize_interval_hours")]
    pub optimize_interval_hours: u64,

    /// Operation count that triggers an out-of-schedule optimization pass.
    #[serde(default = "default_optimize_large_change_threshold")]
    pub optimize_large_change_threshold: u64,

    /// Relational store connection string / path.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_database_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_database_max_connections(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            sync_batch_size: default_sync_batch_size(),
            sync_batch_timeout_seconds: default_sync_batch_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            embedding_max_content_length: default_embedding_max_content_length(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_recovery_timeout_seconds: default_circuit_recovery_timeout_seconds(),
            connection_cap_relational: default_connection_cap_relational(),
            connection_cap_vector: default_connection_cap_vector(),
            connection_cap_graph: default_connection_cap_graph(),
            connection_timeout_relational: default_connection_timeout_relational(),
            connection_timeout_vector: default_connection_timeout_vector(),
            connection_timeout_graph: default_connection_timeout_graph(),
            error_history_window_seconds: default_error_history_window_seconds(),
            optimize_interval_hours: default_optimize_interval_hours(),
            optimize_large_change_threshold: default_optimize_large_change_threshold(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}
fn default_sync_batch_size() -> usize {
    10
}
fn default_sync_batch_timeout_seconds() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    2
}
fn default_embedding_max_content_length() -> usize {
    2000
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_recovery_timeout_seconds() -> u64 {
    60
}
fn default_connection_cap_relational() -> usize {
    10
}
fn default_connection_cap_vector() -> usize {
    5
}
fn default_connection_cap_graph() -> usize {
    5
}
fn default_connection_timeout_relational() -> u64 {
    5
}
fn default_connection_timeout_vector() -> u64 {
    5
}
fn default_connection_timeout_graph() -> u64 {
    5
}
fn default_error_history_window_seconds() -> i64 {
    300
}
fn default_optimize_interval_hours() -> u64 {
    24
}
fn default_optimize_large_change_threshold() -> u64 {
    10_000
}
fn default_database_path() -> String {
    "sqlite://tripledb-sync.db".to_string()
}
fn default_database_max_connections() -> u32 {
    10
}
