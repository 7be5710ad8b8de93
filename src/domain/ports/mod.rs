//! External interfaces (spec §6): narrow per-store ports, implemented by
//! `crate::adapters`.

pub mod graph_store;
pub mod relational_store;
pub mod vector_store;

pub use graph_store::{EdgeLabel, GraphRow, GraphStore, NodeLabel};
pub use relational_store::{RelationalStore, TaskFilter, TaskPatch};
pub use vector_store::{VectorMetadata, VectorStore};
