//! Graph construction module

use anyhow::{anyhow, Result};
use crate::graph::CompressedGraph;
use std::collections::HashMap;

/// Builder for incrementally constructing a CompressedGraph from an edge list
pub struct GraphBuilder {
    /// Number of nodes
    node_count: usize,

    /// Mapping from user ids to node indices
    id_to_index: HashMap<String, u32>,

    /// Node user ids, in order of first appearance
    node_ids: Vec<String>,

    /// Adjacency lists for each node: (target, weight) in insertion order
    adjacency_lists: Vec<Vec<(u32, u32)>>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            node_count: 0,
            id_to_index: HashMap::with_capacity(capacity),
            node_ids: Vec::with_capacity(capacity),
            adjacency_lists: Vec::with_capacity(capacity),
        }
    }

    /// Get or create a node ID for the given user id
    pub fn get_or_create_node(&mut self, id: &str) -> u32 {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }

        let idx = self.node_count as u32;
        self.id_to_index.insert(id.to_string(), idx);
        self.node_ids.push(id.to_string());
        self.adjacency_lists.push(Vec::new());
        self.node_count += 1;

        idx
    }

    /// Add a weighted edge. Parallel edges and self-loops are recorded as given.
    pub fn add_edge(&mut self, src_id: &str, dst_id: &str, weight: u32) {
        let src_idx = self.get_or_create_node(src_id);
        let dst_idx = self.get_or_create_node(dst_id);

        self.adjacency_lists[src_idx as usize].push((dst_idx, weight));
    }

    /// Number of distinct nodes seen so far
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Build the compressed graph
    pub fn build(self) -> Result<CompressedGraph> {
        let edge_count: usize = self.adjacency_lists.iter()
            .map(|list| list.len())
            .sum();

        if u32::try_from(edge_count).is_err() {
            return Err(anyhow!("edge count {} exceeds u32 offsets", edge_count));
        }

        let mut graph = CompressedGraph::with_capacity(self.node_count, edge_count);

        graph.offsets.push(0);
        let mut offset = 0;
        for list in &self.adjacency_lists {
            offset += list.len() as u32;
            graph.offsets.push(offset);
            for &(target, weight) in list {
                graph.edges.push(target);
                graph.weights.push(weight);
            }
        }

        graph.node_ids = self.node_ids;

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_indexed_by_first_appearance() {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("u2", "u1", 3);
        builder.add_edge("u3", "u2", 1);
        assert_eq!(builder.node_count(), 3);

        let graph = builder.build().unwrap();
        assert_eq!(graph.node_ids, vec!["u2", "u1", "u3"]);
        assert_eq!(graph.outgoing_edges(2), &[0]);
        assert_eq!(graph.offsets, vec![0, 1, 1, 2]);
    }

    #[test]
    fn self_loops_survive_construction() {
        let mut builder = GraphBuilder::with_capacity(1);
        builder.add_edge("a", "a", 3);
        let graph = builder.build().unwrap();
        assert!(graph.has_self_loops());
    }
}
