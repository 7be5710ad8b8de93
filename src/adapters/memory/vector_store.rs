//! In-memory `VectorStore` implementation.
//!
//! The real embedding model and vector engine are out of scope (spec
//! §1); this adapter stands in for both in tests and for standalone
//! operation, the way the teacher's `bindery_mock` stands in for its
//! external store in the Python original.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::CoreResult;
use crate::domain::ports::{VectorMetadata, VectorStore};

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub text: String,
    pub metadata: VectorMetadata,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashSet<String>>,
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Test/diagnostic accessor: snapshot of a stored document.
    pub async fn get(&self, doc_id: &str) -> Option<StoredDocument> {
        self.documents.read().await.get(doc_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, doc_id: &str, text: &str, metadata: VectorMetadata) -> CoreResult<()> {
        self.documents.write().await.insert(
            doc_id.to_string(),
            StoredDocument {
                text: text.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> CoreResult<()> {
        self.documents.write().await.remove(doc_id);
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> CoreResult<()> {
        self.collections.write().await.insert(name.to_string());
        Ok(())
    }

    async fn contains(&self, doc_id: &str) -> CoreResult<bool> {
        Ok(self.documents.read().await.contains_key(doc_id))
    }
}
