//! In-memory `GraphStore` implementation (see module doc on
//! [`crate::adapters::memory::vector_store`] for why this stands in for
//! the real engine).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::errors::CoreResult;
use crate::domain::ports::{EdgeLabel, GraphRow, GraphStore, NodeLabel};

#[derive(Debug, Clone, Default)]
struct Node {
    properties: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
struct Edge {
    label: EdgeLabel,
    from_label: NodeLabel,
    from_id: String,
    to_label: NodeLabel,
    to_id: String,
    properties: HashMap<String, Value>,
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    nodes: RwLock<HashMap<(NodeLabel, String), Node>>,
    edges: RwLock<Vec<Edge>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All distinct `(from_id, to_id)` pairs for `label`, used directly
    /// by the graph analyzer's cycle search instead of going through the
    /// row-shaped `query` primitive (spec §4.7's `analyze`).
    pub async fn edge_pairs(&self, label: EdgeLabel) -> Vec<(String, String)> {
        self.edges
            .read()
            .await
            .iter()
            .filter(|e| e.label == label)
            .map(|e| (e.from_id.clone(), e.to_id.clone()))
            .collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_node(&self, label: NodeLabel, id: &str, properties: HashMap<String, Value>) -> CoreResult<()> {
        let mut nodes = self.nodes.write().await;
        let entry = nodes.entry((label, id.to_string())).or_default();
        entry.properties.extend(properties);
        Ok(())
    }

    async fn upsert_edge(
        &self,
        label: EdgeLabel,
        from_label: NodeLabel,
        from_id: &str,
        to_label: NodeLabel,
        to_id: &str,
        properties: HashMap<String, Value>,
    ) -> CoreResult<()> {
        let mut edges = self.edges.write().await;
        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.label == label && e.from_id == from_id && e.to_id == to_id)
        {
            existing.properties.extend(properties);
        } else {
            edges.push(Edge {
                label,
                from_label,
                from_id: from_id.to_string(),
                to_label,
                to_id: to_id.to_string(),
                properties,
            });
        }
        Ok(())
    }

    async fn delete_node_and_edges(&self, label: NodeLabel, id: &str) -> CoreResult<()> {
        self.nodes.write().await.remove(&(label, id.to_string()));
        self.edges
            .write()
            .await
            .retain(|e| !((e.from_label == label && e.from_id == id) || (e.to_label == label && e.to_id == id)));
        Ok(())
    }

    async fn outgoing_edges(&self, label: EdgeLabel, from_id: &str) -> CoreResult<Vec<GraphRow>> {
        let edges = self.edges.read().await;
        let nodes = self.nodes.read().await;
        let rows = edges
            .iter()
            .filter(|e| e.label == label && e.from_id == from_id)
            .map(|e| {
                let mut fields = e.properties.clone();
                fields.insert("to_id".to_string(), Value::String(e.to_id.clone()));
                if let Some(node) = nodes.get(&(e.to_label, e.to_id.clone())) {
                    for (k, v) in &node.properties {
                        fields.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
                GraphRow { fields }
            })
            .collect();
        Ok(rows)
    }

    async fn contains_node(&self, label: NodeLabel, id: &str) -> CoreResult<bool> {
        Ok(self.nodes.read().await.contains_key(&(label, id.to_string())))
    }

    async fn task_ids_with_dependencies(&self) -> CoreResult<Vec<String>> {
        let edges = self.edges.read().await;
        let ids: HashSet<String> = edges
            .iter()
            .filter(|e| e.label == EdgeLabel::DependsOn)
            .map(|e| e.from_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }
}
