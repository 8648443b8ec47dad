//! Pluggable block-partition solver interface

use std::ops::RangeInclusive;

use crate::error::SolverError;
use crate::graph::CompressedGraph;

/// Optional bounds on the number of blocks a fit may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl BlockBounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Concrete block-count range for a graph with `node_count` nodes.
    ///
    /// A missing lower bound is 1; a missing upper bound is `ceil(sqrt(n))`.
    /// Both ends are clamped to the node count.
    pub fn resolve(&self, node_count: usize) -> Result<RangeInclusive<usize>, SolverError> {
        if node_count == 0 {
            return Err(SolverError::EmptyGraph);
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(SolverError::InvalidBounds { min, max });
            }
        }

        let min = self.min.unwrap_or(1).clamp(1, node_count);
        let default_max = ((node_count as f64).sqrt().ceil() as usize).max(min);
        let max = self.max.unwrap_or(default_max).clamp(min, node_count);

        Ok(min..=max)
    }
}

/// Raw output of one fit.
///
/// `labels[i]` is the block of node `i`, or `None` when the solver did not
/// report that node. Labels need not be contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFit {
    pub labels: Vec<Option<u32>>,

    /// Model-fit quality: description length in nats, lower is better
    pub description_length: f64,
}

/// Anything that can fit a directed, weighted stochastic block partition.
///
/// A fit must be a pure function of `(graph, bounds, seed)`.
pub trait BlockModelSolver: Send + Sync {
    fn fit(&self, graph: &CompressedGraph, bounds: BlockBounds, seed: u64) -> Result<BlockFit, SolverError>;

    /// Short name for diagnostics
    fn name(&self) -> &str {
        "block-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_uses_sqrt_of_nodes() {
        assert_eq!(BlockBounds::unbounded().resolve(100).unwrap(), 1..=10);
        assert_eq!(BlockBounds::unbounded().resolve(101).unwrap(), 1..=11);
    }

    #[test]
    fn bounds_are_clamped_to_node_count() {
        let bounds = BlockBounds::new(Some(3), Some(8));
        assert_eq!(bounds.resolve(5).unwrap(), 3..=5);
        assert_eq!(bounds.resolve(2).unwrap(), 2..=2);
    }

    #[test]
    fn inverted_bounds_fail() {
        let bounds = BlockBounds::new(Some(4), Some(2));
        assert_eq!(
            bounds.resolve(10),
            Err(SolverError::InvalidBounds { min: 4, max: 2 })
        );
        assert_eq!(BlockBounds::unbounded().resolve(0), Err(SolverError::EmptyGraph));
    }
}
