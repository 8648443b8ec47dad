//! Reduction of a raw retweet network to its structural core

use crate::config::ReductionConfig;
use crate::data::preprocessing::{drop_self_loops, filter_nodes};
use crate::graph::algorithms::{giant_component_mask, low_information_mask};
use crate::graph::CompressedGraph;

/// Node counts at the three reduction stages of one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionStats {
    /// After self-loop removal, before component extraction
    pub n_nodes_full: usize,
    /// Largest weak component
    pub n_nodes_gc: usize,
    /// After low-information pruning and a second component extraction
    pub n_nodes_sa: usize,
}

/// Result of reducing one event's network
#[derive(Debug, Clone)]
pub struct ReductionOutcome {
    pub stats: ReductionStats,

    /// Reduced network, present only when the event passed the size gate
    pub reduced: Option<CompressedGraph>,
}

impl ReductionOutcome {
    pub fn accepted(&self) -> bool {
        self.reduced.is_some()
    }
}

/// Drop self-loops, then keep only the largest weak component
pub fn reduce_to_giant_component(graph: &CompressedGraph) -> CompressedGraph {
    let simplified = if graph.has_self_loops() {
        drop_self_loops(graph)
    } else {
        graph.clone()
    };
    let mask = giant_component_mask(&simplified);
    filter_nodes(&simplified, &mask)
}

/// Remove low-information nodes, then re-extract the giant component.
///
/// With `fixed_point` the removal is repeated until no node qualifies;
/// otherwise a single pass is made.
pub fn prune_low_information(graph: &CompressedGraph, fixed_point: bool) -> CompressedGraph {
    let mut current = graph.clone();
    loop {
        let mask = low_information_mask(&current);
        let removed = mask.iter().filter(|&&keep| !keep).count();
        log::debug!("Pruning {} low-information nodes of {}", removed, current.node_count);
        if removed == 0 {
            break;
        }
        current = filter_nodes(&current, &mask);
        if !fixed_point {
            break;
        }
    }

    let mask = giant_component_mask(&current);
    filter_nodes(&current, &mask)
}

/// Whether a reduced network is large enough for inference
pub fn passes_size_gate(graph: &CompressedGraph, min_nodes: usize) -> bool {
    graph.node_count >= min_nodes
}

/// Run the full reduction for one event.
///
/// Graphs with fewer than two nodes short-circuit to all-zero stats.
pub fn reduce_network(graph: &CompressedGraph, config: &ReductionConfig) -> ReductionOutcome {
    if graph.node_count < 2 {
        return ReductionOutcome {
            stats: ReductionStats::default(),
            reduced: None,
        };
    }

    let n_nodes_full = graph.node_count;
    let giant = reduce_to_giant_component(graph);
    let n_nodes_gc = giant.node_count;

    let pruned = prune_low_information(&giant, config.prune_to_fixed_point);
    let n_nodes_sa = pruned.node_count;

    let stats = ReductionStats {
        n_nodes_full,
        n_nodes_gc,
        n_nodes_sa,
    };

    let reduced = if passes_size_gate(&pruned, config.min_nodes) {
        Some(pruned)
    } else {
        None
    };

    ReductionOutcome { stats, reduced }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn graph_from(edges: &[(&str, &str, u32)]) -> CompressedGraph {
        let mut builder = GraphBuilder::with_capacity(edges.len());
        for &(src, dst, w) in edges {
            builder.add_edge(src, dst, w);
        }
        builder.build().unwrap()
    }

    #[test]
    fn single_node_short_circuits() {
        let graph = graph_from(&[("a", "a", 1)]);
        let outcome = reduce_network(&graph, &ReductionConfig::default());
        assert_eq!(outcome.stats, ReductionStats::default());
        assert!(!outcome.accepted());
    }

    #[test]
    fn giant_component_is_idempotent() {
        let graph = graph_from(&[("a", "b", 1), ("b", "c", 2), ("c", "a", 1), ("d", "e", 1), ("a", "a", 4)]);
        let once = reduce_to_giant_component(&graph);
        let twice = reduce_to_giant_component(&once);
        assert_eq!(once, twice);
        assert_eq!(once.node_count, 3);
        assert!(!once.has_self_loops());
    }

    #[test]
    fn fixed_point_pruning_goes_further() {
        // chain feeding into a reciprocal pair
        let graph = graph_from(&[("a", "b", 1), ("b", "c", 1), ("c", "d", 1), ("d", "c", 1)]);

        let single = prune_low_information(&graph, false);
        assert_eq!(single.node_ids, vec!["b", "c", "d"]);

        let fixed = prune_low_information(&graph, true);
        assert_eq!(fixed.node_ids, vec!["c", "d"]);
    }

    #[test]
    fn accepted_network_keeps_surviving_edges() {
        // two dense hubs of 30 retweeters each, every retweeter hits both hubs
        let mut edges = Vec::new();
        let names: Vec<String> = (0..60).map(|i| format!("u{}", i)).collect();
        for name in &names {
            edges.push((name.as_str(), "h1", 1));
            edges.push((name.as_str(), "h2", 2));
        }
        let graph = graph_from(&edges);

        let outcome = reduce_network(&graph, &ReductionConfig::default());
        assert_eq!(outcome.stats.n_nodes_full, 62);
        assert_eq!(outcome.stats.n_nodes_gc, 62);
        assert_eq!(outcome.stats.n_nodes_sa, 62);
        let reduced = outcome.reduced.unwrap();
        assert_eq!(reduced.edge_count(), 120);
    }
}
