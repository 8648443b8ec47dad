//! Graph algorithms for network reduction

use crate::graph::CompressedGraph;
use std::collections::HashMap;

/// Union-Find data structure for weak connected component analysis
pub struct DisjointSets {
    /// Parent pointers (parent[i] = parent of node i)
    parent: Vec<u32>,

    /// Size of each set (for union by size)
    rank: Vec<u32>,
}

impl DisjointSets {
    /// Create a new DisjointSets data structure
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![1; size],
        }
    }

    /// Find the root of the set containing x with path compression
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        // Path compression: point every node on the path at the root
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }

        root
    }

    /// Union the sets containing x and y
    pub fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        let rank_x = self.rank[root_x as usize];
        let rank_y = self.rank[root_y as usize];

        if rank_x > rank_y {
            self.parent[root_y as usize] = root_x;
            self.rank[root_x as usize] += rank_y;
        } else {
            self.parent[root_x as usize] = root_y;
            self.rank[root_y as usize] += rank_x;
        }
    }

    /// Get the size of the set containing x
    pub fn size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.rank[root as usize]
    }
}

/// Label every node with its weak component.
///
/// Components are numbered 0.. in the order their first node appears in
/// node index order, so labels are stable for a given graph.
pub fn weak_component_labels(graph: &CompressedGraph) -> Vec<usize> {
    let mut sets = DisjointSets::new(graph.node_count);
    for (src, dst, _) in graph.iter_edges() {
        sets.union(src, dst);
    }

    let mut root_to_label: HashMap<u32, usize> = HashMap::new();
    (0..graph.node_count)
        .map(|node| {
            let root = sets.find(node as u32);
            let next = root_to_label.len();
            *root_to_label.entry(root).or_insert(next)
        })
        .collect()
}

/// Mask selecting the largest weak component.
///
/// Ties go to the component whose first node comes earliest in node order.
pub fn giant_component_mask(graph: &CompressedGraph) -> Vec<bool> {
    if graph.node_count == 0 {
        return Vec::new();
    }

    let labels = weak_component_labels(graph);
    let component_count = labels.iter().max().map_or(0, |&max| max + 1);
    let mut sizes = vec![0usize; component_count];
    for &label in &labels {
        sizes[label] += 1;
    }

    let mut giant = 0;
    for (label, &size) in sizes.iter().enumerate() {
        if size > sizes[giant] {
            giant = label;
        }
    }

    log::debug!(
        "Found {} weak components, giant has {} of {} nodes",
        component_count,
        sizes[giant],
        graph.node_count
    );

    labels.into_iter().map(|label| label == giant).collect()
}

/// Whether a node carries no block-structural signal: nobody points at it
/// and it points at fewer than two distinct nodes.
fn is_low_information(graph: &CompressedGraph, in_degrees: &[u32], node: usize) -> bool {
    in_degrees[node] == 0 && graph.distinct_out_neighbors(node) < 2
}

/// Mask of nodes kept by one pass of low-information pruning.
///
/// Every decision is taken against the graph as given; removing one node
/// does not make another eligible within the same pass.
pub fn low_information_mask(graph: &CompressedGraph) -> Vec<bool> {
    let in_degrees = graph.in_degrees();
    (0..graph.node_count)
        .map(|node| !is_low_information(graph, &in_degrees, node))
        .collect()
}
