//! Memory-efficient weighted graph representation

use std::collections::HashSet;

/// Compressed sparse representation of a directed, weighted multigraph.
///
/// Parallel edges between the same ordered pair are stored separately and
/// keep their original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// Offset array: index where each node's edges begin
    /// offsets[i] to offsets[i+1] defines the edge range for node i
    pub offsets: Vec<u32>,

    /// Edge array: concatenated lists of target nodes
    pub edges: Vec<u32>,

    /// Edge weights, parallel to `edges`
    pub weights: Vec<u32>,

    /// Mapping from internal node IDs to user ids
    pub node_ids: Vec<String>,
}

impl CompressedGraph {
    /// Create a new graph with pre-allocated capacity
    pub fn with_capacity(node_count: usize, edge_count: usize) -> Self {
        Self {
            node_count,
            offsets: Vec::with_capacity(node_count + 1),
            edges: Vec::with_capacity(edge_count),
            weights: Vec::with_capacity(edge_count),
            node_ids: Vec::with_capacity(node_count),
        }
    }

    /// Graph with no nodes and no edges
    pub fn empty() -> Self {
        Self {
            node_count: 0,
            offsets: vec![0],
            edges: Vec::new(),
            weights: Vec::new(),
            node_ids: Vec::new(),
        }
    }

    /// Total number of edges, counting parallel edges separately
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get outgoing edges for a node
    pub fn outgoing_edges(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.edges[start..end]
    }

    /// Weights of the outgoing edges of a node, aligned with `outgoing_edges`
    pub fn outgoing_weights(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.weights[start..end]
    }

    /// Get out-degree of a node (parallel edges counted separately)
    pub fn out_degree(&self, node: usize) -> usize {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        end - start
    }

    /// Number of distinct targets among a node's outgoing edges
    pub fn distinct_out_neighbors(&self, node: usize) -> usize {
        self.outgoing_edges(node).iter().collect::<HashSet<_>>().len()
    }

    /// In-degree of every node (parallel edges counted separately)
    pub fn in_degrees(&self) -> Vec<u32> {
        let mut degrees = vec![0u32; self.node_count];
        for &target in &self.edges {
            degrees[target as usize] += 1;
        }
        degrees
    }

    /// Out-degree of every node
    pub fn out_degrees(&self) -> Vec<u32> {
        (0..self.node_count)
            .map(|node| self.out_degree(node) as u32)
            .collect()
    }

    /// Check whether any edge starts and ends at the same node
    pub fn has_self_loops(&self) -> bool {
        (0..self.node_count).any(|node| {
            self.outgoing_edges(node)
                .iter()
                .any(|&target| target as usize == node)
        })
    }

    /// Iterate over `(source, target, weight)` triples grouped by source
    pub fn iter_edges(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        (0..self.node_count).flat_map(move |src| {
            self.outgoing_edges(src)
                .iter()
                .zip(self.outgoing_weights(src))
                .map(move |(&dst, &w)| (src as u32, dst, w))
        })
    }
}
