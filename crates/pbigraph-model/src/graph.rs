//! Dependency graph assembly and traversal
//!
//! A small explicit graph value: the catalog's nodes plus directed edges
//! `(source, target)` meaning "target's definition references source".

use std::collections::{HashMap, HashSet, VecDeque};
use pbigraph_core::GraphPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::catalog::{Node, NodeCatalog, NodeId};

/// Directed dependency: `target` references `source`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Directed, possibly cyclic, dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// All nodes, isolated ones included, in catalog order
    nodes: Vec<Node>,

    /// Edges in emission order
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Assemble a graph from a catalog and resolved edges
    ///
    /// Edges naming identifiers outside the catalog are dropped and logged.
    pub fn assemble(
        catalog: &NodeCatalog,
        edges: impl IntoIterator<Item = Edge>,
        policy: &GraphPolicy,
    ) -> Self {
        Self::assemble_with_rejects(catalog, edges, policy).0
    }

    /// Like [`DependencyGraph::assemble`], also returning the dangling edges
    pub fn assemble_with_rejects(
        catalog: &NodeCatalog,
        edges: impl IntoIterator<Item = Edge>,
        policy: &GraphPolicy,
    ) -> (Self, Vec<Edge>) {
        let mut seen: HashSet<Edge> = HashSet::new();
        let mut kept = Vec::new();
        let mut dangling = Vec::new();

        for edge in edges {
            if !catalog.contains(&edge.source) || !catalog.contains(&edge.target) {
                warn!(source = %edge.source, target = %edge.target, "dropping edge outside the catalog");
                dangling.push(edge);
                continue;
            }

            if edge.is_self_loop() && !policy.allow_self_loops {
                continue;
            }

            if policy.dedup_edges && !seen.insert(edge.clone()) {
                continue;
            }

            kept.push(edge);
        }

        let graph = Self {
            nodes: catalog.iter().cloned().collect(),
            edges: kept,
        };

        (graph, dangling)
    }

    /// Get all nodes in the graph
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Get all node identifiers
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|node| &node.id)
    }

    /// Get all edges
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == node_id)
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }

    /// Get immediate parents (nodes this node references)
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|edge| edge.target == node_id)
            .map(|edge| &edge.source)
            .collect()
    }

    /// Get immediate children (nodes that reference this node)
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|edge| edge.source == node_id)
            .map(|edge| &edge.target)
            .collect()
    }

    /// Nodes with no incoming or outgoing edge
    pub fn isolated_nodes(&self) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|node| {
                !self
                    .edges
                    .iter()
                    .any(|edge| edge.source == node.id || edge.target == node.id)
            })
            .map(|node| &node.id)
            .collect()
    }

    /// Get all downstream nodes (transitive closure of children)
    ///
    /// Everything that breaks if this node changes.
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        self.walk(node_id, &self.adjacency(|edge| (&edge.source, &edge.target)))
    }

    /// Get all upstream nodes (transitive closure of parents)
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        self.walk(node_id, &self.adjacency(|edge| (&edge.target, &edge.source)))
    }

    /// Get topological sort of all nodes (dependencies first)
    ///
    /// Returns `None` when the graph has a cycle.
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let children = self.adjacency(|edge| (&edge.source, &edge.target));
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|node| (node.id.as_str(), 0)).collect();

        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
                *degree += 1;
            }
        }

        // Seed in catalog order so the result is deterministic
        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut result = Vec::new();

        // Kahn's algorithm
        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());

            for &child in children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Identifier with characters reserved by DOT (`:`) removed
    ///
    /// Applied to report ids when `sanitize_ids` is set.
    pub fn sanitized_id(node_id: &str) -> String {
        node_id.replace(':', "")
    }

    fn adjacency<'a>(
        &'a self,
        direction: impl Fn(&'a Edge) -> (&'a NodeId, &'a NodeId),
    ) -> HashMap<&'a str, Vec<&'a str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            let (from, to) = direction(edge);
            adjacency.entry(from.as_str()).or_default().push(to.as_str());
        }
        adjacency
    }

    fn walk(&self, start: &str, adjacency: &HashMap<&str, Vec<&str>>) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = adjacency.get(start) {
            queue.extend(next.iter().copied());
        }

        // BFS
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            result.push(current.to_string());

            if let Some(next) = adjacency.get(current) {
                queue.extend(next.iter().copied().filter(|n| !visited.contains(n)));
            }
        }

        result
    }
}
