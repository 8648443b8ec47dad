//! Run ensembles and deterministic partition selection

use rayon::prelude::*;
use std::time::Instant;

use crate::cluster::metrics::score_against_layout;
use crate::cluster::solver::{BlockBounds, BlockModelSolver};
use crate::cluster::{BlockAssignment, EventResult, InferenceRun};
use crate::config::InferenceConfig;
use crate::data::SpatialLayout;
use crate::error::{PipelineError, SolverError};
use crate::graph::CompressedGraph;

/// Outcome of the selection rule over one ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Chosen run; its assignment is collapsed to one block when no run passed
    pub run: InferenceRun,
    /// Highest score across all runs
    pub max_score: f64,
    /// Whether multi-block structure was discarded
    pub collapsed: bool,
}

/// Fit, resolve and score a single run
pub fn run_once(
    graph: &CompressedGraph,
    layout: &SpatialLayout,
    solver: &dyn BlockModelSolver,
    bounds: BlockBounds,
    run: usize,
    seed: u64,
) -> Result<InferenceRun, SolverError> {
    let fit = solver.fit(graph, bounds, seed)?;
    let assignment = BlockAssignment::from_fit(graph, &fit)?;
    let score = score_against_layout(&assignment, layout);

    log::debug!(
        "run {} (seed {}): {} blocks, DL {:.3}, silhouette {:.4}",
        run,
        seed,
        assignment.block_count(),
        fit.description_length,
        score
    );

    Ok(InferenceRun {
        run,
        seed,
        assignment,
        score,
        description_length: fit.description_length,
    })
}

/// Run the solver `config.n_runs` times; run `i` uses seed `config.seed + i`.
///
/// Runs execute in parallel; results come back in run order.
pub fn run_ensemble(
    graph: &CompressedGraph,
    layout: &SpatialLayout,
    solver: &dyn BlockModelSolver,
    config: &InferenceConfig,
) -> Vec<Result<InferenceRun, SolverError>> {
    let bounds = BlockBounds::new(config.min_blocks, config.max_blocks);
    (0..config.n_runs)
        .into_par_iter()
        .map(|run| run_once(graph, layout, solver, bounds, run, config.seed.wrapping_add(run as u64)))
        .collect()
}

/// Pick one run.
///
/// The highest-scoring run wins (earliest on ties) if it reaches `threshold`.
/// Otherwise the first run is kept with every node in block 1.
/// Returns `None` only for an empty ensemble.
pub fn select_run(runs: Vec<InferenceRun>, threshold: f64) -> Option<Selection> {
    let mut best: Option<usize> = None;
    for (i, run) in runs.iter().enumerate() {
        if best.map_or(true, |b| run.score > runs[b].score) {
            best = Some(i);
        }
    }
    let best = best?;
    let max_score = runs[best].score;

    if max_score >= threshold {
        let run = runs.into_iter().nth(best)?;
        Some(Selection {
            run,
            max_score,
            collapsed: false,
        })
    } else {
        let mut run = runs.into_iter().next()?;
        run.assignment = run.assignment.collapsed();
        Some(Selection {
            run,
            max_score,
            collapsed: true,
        })
    }
}

/// Full inference for one event: ensemble, scoring, selection.
///
/// Failed runs are dropped; the event fails only if every run does.
pub fn infer_event(
    trend: &str,
    graph: &CompressedGraph,
    layout: &SpatialLayout,
    solver: &dyn BlockModelSolver,
    config: &InferenceConfig,
) -> Result<EventResult, PipelineError> {
    let tic = Instant::now();

    let mut runs = Vec::with_capacity(config.n_runs);
    for (i, result) in run_ensemble(graph, layout, solver, config).into_iter().enumerate() {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => log::warn!("{}: run {} of {} failed: {}", trend, i, solver.name(), e),
        }
    }
    let succeeded = runs.len();

    let selection = select_run(runs, config.silhouette_threshold).ok_or_else(|| PipelineError::AllRunsFailed {
        trend: trend.to_string(),
        attempts: config.n_runs,
    })?;

    let computation_time = tic.elapsed();

    log::info!(
        "{}: {}/{} runs succeeded, S_max {:.4}, {} blocks{}",
        trend,
        succeeded,
        config.n_runs,
        selection.max_score,
        selection.run.assignment.block_count(),
        if selection.collapsed { " (collapsed)" } else { "" }
    );

    Ok(EventResult {
        trend: trend.to_string(),
        n_users: graph.node_count,
        n_links: graph.edge_count(),
        n_clusters: selection.run.assignment.block_count(),
        silhouette_score: selection.max_score,
        n_sbm_runs: config.n_runs,
        computation_time,
        assignment: selection.run.assignment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_run(run: usize, blocks: Vec<u32>, score: f64) -> InferenceRun {
        let n = blocks.len();
        InferenceRun {
            run,
            seed: run as u64,
            assignment: BlockAssignment {
                user_ids: (0..n).map(|i| format!("u{}", i)).collect(),
                blocks,
                indegree: vec![0; n],
                outdegree: vec![0; n],
            },
            score,
            description_length: 0.0,
        }
    }

    fn ensemble(scores: &[f64]) -> Vec<InferenceRun> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| fake_run(i, vec![1, 2, (i % 3 + 1) as u32], s))
            .collect()
    }

    #[test]
    fn best_run_above_threshold_wins() {
        let selection = select_run(ensemble(&[0.1, 0.45, 0.3, 0.41, 0.2]), 0.4).unwrap();
        assert_eq!(selection.run.run, 1);
        assert_eq!(selection.max_score, 0.45);
        assert!(!selection.collapsed);
        assert_eq!(selection.run.assignment.block_count(), 2);
    }

    #[test]
    fn below_threshold_collapses_first_run() {
        let selection = select_run(ensemble(&[0.1, 0.39, 0.2, 0.05, 0.3]), 0.4).unwrap();
        assert_eq!(selection.run.run, 0);
        assert_eq!(selection.max_score, 0.39);
        assert!(selection.collapsed);
        assert_eq!(selection.run.assignment.block_count(), 1);
    }

    #[test]
    fn ties_go_to_first_run() {
        let selection = select_run(ensemble(&[0.5, 0.7, 0.7]), 0.4).unwrap();
        assert_eq!(selection.run.run, 1);
    }

    #[test]
    fn sentinel_never_beats_a_real_score() {
        let selection = select_run(ensemble(&[-2.0, -0.9, -2.0]), 0.4).unwrap();
        assert_eq!(selection.max_score, -0.9);
        assert!(selection.collapsed);
    }

    #[test]
    fn empty_ensemble_selects_nothing() {
        assert!(select_run(Vec::new(), 0.4).is_none());
    }
}
