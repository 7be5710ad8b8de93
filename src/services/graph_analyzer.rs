//! Graph read-path analysis (spec §4.7, C6).
//!
//! Grounded on the DFS-with-recursion-stack cycle detector and Kahn's
//! algorithm used for in-process task lists in the dependency resolver
//! this module generalizes, adapted to read through the graph store port
//! instead of an in-memory task slice.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::ports::graph_store::{node_id, EdgeLabel, GraphStore};

const MAX_HIERARCHY_DEPTH: usize = 50;
const MAX_CYCLE_SEARCH_DEPTH: usize = 10;

/// Default `max_depth` for [`GraphAnalyzer::hierarchy`] (spec §4.7).
pub const DEFAULT_HIERARCHY_DEPTH: usize = 5;

/// Bundles a task's dependencies, blockers, and (if found) a cycle
/// running back through the task itself (spec §4.7's `analyze`).
#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskAnalysis {
    pub dependencies: Vec<Uuid>,
    pub blockers: Vec<Uuid>,
    pub cycle: Option<Vec<Uuid>>,
}

pub struct GraphAnalyzer {
    graph: Arc<dyn GraphStore>,
}

impl GraphAnalyzer {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    pub async fn dependencies(&self, task_id: Uuid) -> CoreResult<Vec<Uuid>> {
        self.targets(EdgeLabel::DependsOn, task_id).await
    }

    pub async fn blocks(&self, task_id: Uuid) -> CoreResult<Vec<Uuid>> {
        self.targets(EdgeLabel::Blocks, task_id).await
    }

    /// Full `ParentChild` closure below `root`, collected level by level
    /// up to `max_depth` (spec §4.7: `hierarchy(root, max_depth=5)`), not
    /// just the first child at each level. Bounded by the hard ceiling
    /// [`MAX_HIERARCHY_DEPTH`] regardless of the caller-supplied depth so
    /// a malformed graph can't cause an unbounded walk.
    pub async fn hierarchy(&self, root: Uuid, max_depth: usize) -> CoreResult<Vec<Uuid>> {
        let max_depth = max_depth.min(MAX_HIERARCHY_DEPTH);
        let mut collected = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(root);
        let mut frontier = vec![root];

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for node in frontier {
                for child in self.targets(EdgeLabel::ParentChild, node).await? {
                    if seen.insert(child) {
                        collected.push(child);
                        next_frontier.push(child);
                    }
                }
            }
            frontier = next_frontier;
        }
        Ok(collected)
    }

    /// `SimilarContent` edges whose precomputed `similarity_score`
    /// property meets `min_score`, most-similar edges first, truncated
    /// to `limit` (spec §4.7, §6.3).
    pub async fn similar(&self, task_id: Uuid, min_score: f64, limit: usize) -> CoreResult<Vec<Uuid>> {
        let rows = self.graph.outgoing_edges(EdgeLabel::SimilarContent, &node_id(task_id)).await?;
        let mut scored: Vec<(f64, Uuid)> = rows
            .into_iter()
            .filter_map(|row| {
                let score = row.fields.get("similarity_score").and_then(|v| v.as_f64())?;
                let to_id = row.fields.get("to_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())?;
                (score >= min_score).then_some((score, to_id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, id)| id).collect())
    }

    /// Bundles a task's dependencies and blockers with a bounded
    /// depth-first search for a `DependsOn` path back to the origin task
    /// (spec §4.7).
    pub async fn analyze(&self, task_id: Uuid) -> CoreResult<TaskAnalysis> {
        let dependencies = self.dependencies(task_id).await?;
        let blockers = self.blocks(task_id).await?;
        let mut path = vec![task_id];
        let mut visited = HashSet::new();
        visited.insert(task_id);
        let cycle = self.search_cycle(task_id, task_id, &mut path, &mut visited, 0).await?;
        Ok(TaskAnalysis { dependencies, blockers, cycle })
    }

    fn search_cycle<'a>(
        &'a self,
        origin: Uuid,
        current: Uuid,
        path: &'a mut Vec<Uuid>,
        visited: &'a mut HashSet<Uuid>,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = CoreResult<Option<Vec<Uuid>>>> + Send + 'a>> {
        Box::pin(async move {
            if depth >= MAX_CYCLE_SEARCH_DEPTH {
                return Ok(None);
            }
            for next in self.dependencies(current).await? {
                if next == origin && depth > 0 {
                    path.push(next);
                    return Ok(Some(path.clone()));
                }
                if visited.insert(next) {
                    path.push(next);
                    if let Some(cycle) = self.search_cycle(origin, next, path, visited, depth + 1).await? {
                        return Ok(Some(cycle));
                    }
                    path.pop();
                }
            }
            Ok(None)
        })
    }

    async fn targets(&self, label: EdgeLabel, task_id: Uuid) -> CoreResult<Vec<Uuid>> {
        let rows = self.graph.outgoing_edges(label, &node_id(task_id)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.fields
                    .get("to_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .collect())
    }

    /// Full-graph cycle check over every task with at least one
    /// `DependsOn` edge (spec §4.6's `full_cycle_check`).
    pub async fn full_cycle_check(&self) -> CoreResult<Option<Vec<Uuid>>> {
        let root_ids = self.graph.task_ids_with_dependencies().await?;
        let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for id in &root_ids {
            let Ok(task_id) = Uuid::parse_str(id) else { continue };
            let deps = self.dependencies(task_id).await?;
            adjacency.insert(task_id, deps);
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        let mut path = Vec::new();
        let keys: Vec<Uuid> = adjacency.keys().copied().collect();

        for task_id in keys {
            if !visited.contains(&task_id) {
                if let Some(cycle) = detect_cycle(task_id, &adjacency, &mut visited, &mut stack, &mut path) {
                    return Ok(Some(cycle));
                }
            }
        }
        Ok(None)
    }
}

fn detect_cycle(
    node: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
    visited: &mut HashSet<Uuid>,
    rec_stack: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> Option<Vec<Uuid>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(&node) {
        for &neighbor in neighbors {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = detect_cycle(neighbor, graph, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                if let Some(start) = path.iter().position(|&id| id == neighbor) {
                    return Some(path[start..].to_vec());
                }
            }
        }
    }

    rec_stack.remove(&node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryGraphStore;
    use crate::domain::ports::graph_store::NodeLabel;
    use std::collections::HashMap as StdHashMap;

    #[tokio::test]
    async fn detects_no_cycle_in_linear_chain() {
        let graph = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        graph.upsert_node(NodeLabel::Task, &node_id(a), StdHashMap::new()).await.unwrap();
        graph.upsert_node(NodeLabel::Task, &node_id(b), StdHashMap::new()).await.unwrap();
        graph
            .upsert_edge(EdgeLabel::DependsOn, NodeLabel::Task, &node_id(b), NodeLabel::Task, &node_id(a), StdHashMap::new())
            .await
            .unwrap();

        let analyzer = GraphAnalyzer::new(graph);
        let analysis = analyzer.analyze(b).await.unwrap();
        assert_eq!(analysis.dependencies, vec![a]);
        assert!(analysis.cycle.is_none());
    }

    #[tokio::test]
    async fn full_cycle_check_finds_mutual_dependency() {
        let graph = InMemoryGraphStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        graph
            .upsert_edge(EdgeLabel::DependsOn, NodeLabel::Task, &node_id(a), NodeLabel::Task, &node_id(b), StdHashMap::new())
            .await
            .unwrap();
        graph
            .upsert_edge(EdgeLabel::DependsOn, NodeLabel::Task, &node_id(b), NodeLabel::Task, &node_id(a), StdHashMap::new())
            .await
            .unwrap();

        let analyzer = GraphAnalyzer::new(graph);
        let cycle = analyzer.full_cycle_check().await.unwrap();
        assert!(cycle.is_some());
    }
}
