//! SQLite adapter: the relational store, the source of truth (spec §6.1).

pub mod connection;
pub mod migrations;
pub mod relational_store;

pub use connection::{create_pool, create_test_pool, PoolConfig};
pub use migrations::Migrator;
pub use relational_store::SqliteRelationalStore;
