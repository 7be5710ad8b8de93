//! Shared fixtures for integration tests: task/event/rule builders and a
//! real in-memory SQLite relational store.

#![allow(dead_code)]

use std::sync::Arc;

use tripledb_sync_core::adapters::memory::{InMemoryGraphStore, InMemoryVectorStore};
use tripledb_sync_core::adapters::sqlite::connection::create_test_pool;
use tripledb_sync_core::adapters::sqlite::migrations::Migrator;
use tripledb_sync_core::adapters::sqlite::SqliteRelationalStore;
use tripledb_sync_core::domain::models::{EventKind, Task, TaskEvent};
use tripledb_sync_core::domain::ports::{GraphStore, RelationalStore, VectorStore};

/// Builds a relational store backed by a fresh in-memory SQLite pool
/// with migrations applied, ready for a single test.
pub async fn relational_store() -> Arc<dyn RelationalStore> {
    let pool = create_test_pool().await.expect("create test pool");
    Migrator::new(pool.clone()).run().await.expect("run migrations");
    Arc::new(SqliteRelationalStore::new(pool))
}

pub fn vector_store() -> Arc<dyn VectorStore> {
    InMemoryVectorStore::new()
}

pub fn graph_store() -> Arc<dyn GraphStore> {
    InMemoryGraphStore::new()
}

/// A pending task with default priority and status.
pub fn sample_task(title: &str) -> Task {
    Task::new(title, format!("description for {title}"))
}

/// A `Created` event carrying the given task's id.
pub fn created_event(task: &Task) -> TaskEvent {
    TaskEvent::new(EventKind::Created, task.id, "test")
}
