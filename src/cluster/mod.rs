//! Block-model inference, scoring and selection

pub mod assignment;
pub mod ensemble;
pub mod metrics;
pub mod sbm;
pub mod solver;

use itertools::Itertools;
use std::time::Duration;

pub use sbm::BayesianBlockModel;
pub use solver::{BlockBounds, BlockFit, BlockModelSolver};

/// Score of a partition that cannot be scored (fewer than two blocks).
/// Lower than any real silhouette coefficient.
pub const DEGENERATE_SCORE: f64 = -2.0;

/// Block of every node of a reduced network, with its degrees there.
///
/// Blocks are always `1..=K` without gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAssignment {
    pub user_ids: Vec<String>,
    pub blocks: Vec<u32>,
    pub indegree: Vec<u32>,
    pub outdegree: Vec<u32>,
}

impl BlockAssignment {
    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }

    /// Number of distinct blocks
    pub fn block_count(&self) -> usize {
        self.blocks.iter().unique().count()
    }

    /// Same nodes and degrees, everyone in block 1
    pub fn collapsed(&self) -> BlockAssignment {
        BlockAssignment {
            blocks: vec![1; self.blocks.len()],
            ..self.clone()
        }
    }
}

/// One stochastic fit and its score
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRun {
    /// Position in the ensemble
    pub run: usize,
    pub seed: u64,
    pub assignment: BlockAssignment,
    /// Silhouette score, or [`DEGENERATE_SCORE`]
    pub score: f64,
    pub description_length: f64,
}

/// Selected partition of one event plus its summary row
#[derive(Debug, Clone)]
pub struct EventResult {
    pub trend: String,
    pub n_users: usize,
    pub n_links: usize,
    pub n_clusters: usize,
    /// Best score across the ensemble, even when structure was discarded
    pub silhouette_score: f64,
    pub n_sbm_runs: usize,
    pub computation_time: Duration,
    pub assignment: BlockAssignment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_keeps_degrees() {
        let assignment = BlockAssignment {
            user_ids: vec!["a".into(), "b".into()],
            blocks: vec![1, 2],
            indegree: vec![3, 0],
            outdegree: vec![0, 5],
        };
        let collapsed = assignment.collapsed();
        assert_eq!(collapsed.blocks, vec![1, 1]);
        assert_eq!(collapsed.block_count(), 1);
        assert_eq!(collapsed.indegree, assignment.indegree);
        assert_eq!(assignment.block_count(), 2);
    }
}
