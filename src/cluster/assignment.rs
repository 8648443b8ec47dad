//! Turning raw solver output into a complete, contiguous block assignment

use std::collections::HashMap;

use crate::cluster::solver::BlockFit;
use crate::cluster::BlockAssignment;
use crate::error::SolverError;
use crate::graph::CompressedGraph;

/// Fill in nodes the solver did not report.
///
/// A missing node takes the block of its first out-neighbor that has one.
/// Chains of missing nodes are resolved over repeated passes; anything still
/// unresolved falls back to the block of the first labelled node.
pub fn resolve_missing(graph: &CompressedGraph, labels: &[Option<u32>]) -> Vec<u32> {
    let mut resolved = labels.to_vec();
    let missing = resolved.iter().filter(|l| l.is_none()).count();
    if missing == 0 {
        return resolved.into_iter().flatten().collect();
    }

    log::debug!("Resolving {} nodes missing from solver output", missing);

    loop {
        let mut changed = false;
        for node in 0..graph.node_count {
            if resolved[node].is_some() {
                continue;
            }
            let inherited = graph
                .outgoing_edges(node)
                .iter()
                .find_map(|&target| resolved[target as usize]);
            if inherited.is_some() {
                resolved[node] = inherited;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let fallback = resolved.iter().flatten().next().copied().unwrap_or(0);
    resolved
        .into_iter()
        .enumerate()
        .map(|(node, label)| {
            label.unwrap_or_else(|| {
                log::warn!(
                    "Node {} has no labelled out-neighbor, assigning block {}",
                    graph.node_ids[node],
                    fallback
                );
                fallback
            })
        })
        .collect()
}

/// Rename labels to 1..=K in order of first appearance.
///
/// Nodes sharing a label before keep sharing one after, and no others do.
pub fn relabel_contiguous(labels: &[u32]) -> Vec<u32> {
    let mut mapping: HashMap<u32, u32> = HashMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = mapping.len() as u32 + 1;
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

impl BlockAssignment {
    /// Complete, relabelled assignment for every node of `graph`, with the
    /// node degrees taken from the same graph.
    pub fn from_fit(graph: &CompressedGraph, fit: &BlockFit) -> Result<Self, SolverError> {
        if fit.labels.len() != graph.node_count {
            return Err(SolverError::LabelCountMismatch {
                expected: graph.node_count,
                found: fit.labels.len(),
            });
        }

        let resolved = resolve_missing(graph, &fit.labels);
        Ok(Self {
            user_ids: graph.node_ids.clone(),
            blocks: relabel_contiguous(&resolved),
            indegree: graph.in_degrees(),
            outdegree: graph.out_degrees(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    #[test]
    fn relabel_is_dense_and_order_preserving() {
        assert_eq!(relabel_contiguous(&[7, 3, 7, 9, 3]), vec![1, 2, 1, 3, 2]);
        assert_eq!(relabel_contiguous(&[]), Vec::<u32>::new());
    }

    #[test]
    fn missing_node_inherits_first_out_neighbor() {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("leaf", "hub_b", 1);
        builder.add_edge("leaf", "hub_a", 1);
        builder.add_edge("hub_a", "hub_b", 1);
        let graph = builder.build().unwrap();

        // leaf, hub_b, hub_a
        let resolved = resolve_missing(&graph, &[None, Some(4), Some(2)]);
        assert_eq!(resolved, vec![4, 4, 2]);
    }

    #[test]
    fn chains_of_missing_nodes_resolve() {
        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("a", "b", 1);
        builder.add_edge("b", "c", 1);
        let graph = builder.build().unwrap();

        assert_eq!(resolve_missing(&graph, &[None, None, Some(5)]), vec![5, 5, 5]);
    }

    #[test]
    fn sink_without_label_falls_back() {
        let mut builder = GraphBuilder::with_capacity(2);
        builder.add_edge("a", "b", 1);
        let graph = builder.build().unwrap();

        assert_eq!(resolve_missing(&graph, &[Some(3), None]), vec![3, 3]);
    }

    #[test]
    fn assignment_carries_degrees() {
        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("a", "b", 1);
        builder.add_edge("a", "b", 1);
        builder.add_edge("c", "a", 2);
        let graph = builder.build().unwrap();

        let fit = BlockFit {
            labels: vec![Some(10), Some(4), None],
            description_length: 1.0,
        };
        let assignment = BlockAssignment::from_fit(&graph, &fit).unwrap();
        assert_eq!(assignment.blocks, vec![1, 2, 1]);
        assert_eq!(assignment.indegree, vec![1, 2, 0]);
        assert_eq!(assignment.outdegree, vec![2, 0, 1]);
        assert_eq!(assignment.block_count(), 2);
    }

    #[test]
    fn wrong_label_count_is_a_solver_error() {
        let mut builder = GraphBuilder::with_capacity(2);
        builder.add_edge("a", "b", 1);
        let graph = builder.build().unwrap();
        let fit = BlockFit {
            labels: vec![Some(0)],
            description_length: 0.0,
        };
        assert!(matches!(
            BlockAssignment::from_fit(&graph, &fit),
            Err(SolverError::LabelCountMismatch { expected: 2, found: 1 })
        ));
    }
}
