//! Data preprocessing module for graph reduction

use crate::graph::CompressedGraph;

/// Copy of the graph without edges whose source equals their target.
///
/// All nodes are kept, including ones left isolated. Parallel edges between
/// distinct nodes are untouched.
pub fn drop_self_loops(graph: &CompressedGraph) -> CompressedGraph {
    let mut simplified = CompressedGraph::with_capacity(graph.node_count, graph.edge_count());

    simplified.offsets.push(0);
    let mut offset = 0;

    for node in 0..graph.node_count {
        for (&target, &weight) in graph.outgoing_edges(node).iter().zip(graph.outgoing_weights(node)) {
            if target as usize != node {
                simplified.edges.push(target);
                simplified.weights.push(weight);
                offset += 1;
            }
        }
        simplified.offsets.push(offset);
    }

    simplified.node_ids = graph.node_ids.clone();
    simplified
}

/// Induced subgraph on the nodes where `keep` is true.
///
/// Surviving nodes keep their relative order; an edge survives when both
/// endpoints do.
pub fn filter_nodes(graph: &CompressedGraph, keep: &[bool]) -> CompressedGraph {
    debug_assert_eq!(keep.len(), graph.node_count);

    // Create mapping from original to filtered indices
    let mut orig_to_filtered = vec![u32::MAX; graph.node_count];
    let mut filtered_count = 0usize;
    for node in 0..graph.node_count {
        if keep[node] {
            orig_to_filtered[node] = filtered_count as u32;
            filtered_count += 1;
        }
    }

    let mut filtered_graph = CompressedGraph::with_capacity(filtered_count, graph.edge_count());

    filtered_graph.offsets.push(0);
    let mut offset = 0;

    for node in 0..graph.node_count {
        if !keep[node] {
            continue;
        }

        for (&target, &weight) in graph.outgoing_edges(node).iter().zip(graph.outgoing_weights(node)) {
            let target_idx = target as usize;
            // Only include edges where both endpoints pass the filter
            if keep[target_idx] {
                filtered_graph.edges.push(orig_to_filtered[target_idx]);
                filtered_graph.weights.push(weight);
                offset += 1;
            }
        }
        filtered_graph.offsets.push(offset);
        filtered_graph.node_ids.push(graph.node_ids[node].clone());
    }

    filtered_graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    #[test]
    fn self_loops_dropped_nodes_kept() {
        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("a", "a", 3);
        builder.add_edge("a", "b", 1);
        builder.add_edge("c", "c", 1);
        let graph = drop_self_loops(&builder.build().unwrap());

        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.has_self_loops());
        assert_eq!(graph.outgoing_weights(0), &[1]);
    }

    #[test]
    fn filter_reindexes_targets() {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("a", "b", 1);
        builder.add_edge("b", "c", 2);
        builder.add_edge("c", "d", 3);
        let graph = builder.build().unwrap();

        let sub = filter_nodes(&graph, &[false, true, true, true]);
        assert_eq!(sub.node_ids, vec!["b", "c", "d"]);
        assert_eq!(sub.outgoing_edges(0), &[1]);
        assert_eq!(sub.outgoing_weights(1), &[3]);
        assert_eq!(sub.edge_count(), 2);
    }
}
