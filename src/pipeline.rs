//! Per-event drivers and batch processing over a directory of events

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::cluster::ensemble::infer_event;
use crate::cluster::{BlockModelSolver, EventResult};
use crate::config::{InferenceConfig, ReductionConfig};
use crate::data::loader::{load_edge_list, load_layout};
use crate::error::PipelineError;
use crate::reduce::{reduce_network, ReductionOutcome};
use crate::storage::{
    save_summary, write_block_assignment, write_edge_list, write_reduction_stats, BatchSummary,
    EventStatsRow, StatsRecorder,
};

pub const RAW_SUFFIX: &str = "_rtn.csv";
pub const REDUCED_SUFFIX: &str = "_rtn_pp.csv";
pub const REDUCTION_STATS_SUFFIX: &str = "_stats.csv";
pub const LAYOUT_SUFFIX: &str = "_fdl.csv";
pub const ASSIGNMENT_SUFFIX: &str = "_sbm.csv";
pub const EVENT_STATS_FILE: &str = "sbm_stats.csv";

/// How one event left a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Accepted,
    Rejected,
    Skipped,
    Failed,
}

impl BatchSummary {
    fn tally(statuses: &[EventStatus]) -> Self {
        let mut summary = BatchSummary {
            events: statuses.len(),
            ..BatchSummary::default()
        };
        for status in statuses {
            match status {
                EventStatus::Accepted => summary.accepted += 1,
                EventStatus::Rejected => summary.rejected += 1,
                EventStatus::Skipped => summary.skipped += 1,
                EventStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

/// Event names of every `{trend}{suffix}` file in `dir`, sorted
pub fn discover_events(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    let mut trends = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(trend) = name.to_str().and_then(|n| n.strip_suffix(suffix)) {
            if !trend.is_empty() {
                trends.push(trend.to_string());
            }
        }
    }
    trends.sort();
    Ok(trends)
}

/// Reduce one raw network and write its stats file (and edge list, if kept)
pub fn reduce_event(
    trend: &str,
    input_dir: &Path,
    output_dir: &Path,
    config: &ReductionConfig,
) -> Result<ReductionOutcome> {
    let graph = load_edge_list(&input_dir.join(format!("{}{}", trend, RAW_SUFFIX)))?;
    let outcome = reduce_network(&graph, config);

    log::debug!(
        "{}: {} -> {} -> {} nodes",
        trend,
        outcome.stats.n_nodes_full,
        outcome.stats.n_nodes_gc,
        outcome.stats.n_nodes_sa
    );

    if let Some(reduced) = &outcome.reduced {
        write_edge_list(reduced, &output_dir.join(format!("{}{}", trend, REDUCED_SUFFIX)))?;
    }
    write_reduction_stats(
        &outcome.stats,
        &output_dir.join(format!("{}{}", trend, REDUCTION_STATS_SUFFIX)),
    )?;

    Ok(outcome)
}

/// Reduce every `*_rtn.csv` in `input_dir`, one event per task
pub fn run_reduction(input_dir: &Path, output_dir: &Path, config: &ReductionConfig) -> Result<BatchSummary> {
    fs::create_dir_all(output_dir)?;
    let trends = discover_events(input_dir, RAW_SUFFIX)?;
    log::info!("Preprocessing {} retweet networks", trends.len());

    let statuses: Vec<EventStatus> = trends
        .par_iter()
        .map(|trend| match reduce_event(trend, input_dir, output_dir, config) {
            Ok(outcome) if outcome.accepted() => EventStatus::Accepted,
            Ok(outcome) => {
                log::info!(
                    "{}: rejected with {} nodes after reduction (undersized)",
                    trend,
                    outcome.stats.n_nodes_sa
                );
                EventStatus::Rejected
            }
            Err(e) => {
                log::error!("{}: reduction failed: {:#}", trend, e);
                EventStatus::Failed
            }
        })
        .collect();

    let summary = BatchSummary::tally(&statuses);
    log::info!(
        "Reduction done: {} accepted, {} rejected, {} failed",
        summary.accepted,
        summary.rejected,
        summary.failed
    );
    save_summary(&summary, output_dir, "reduction_summary.json")?;
    Ok(summary)
}

/// Infer, select and persist the block assignment of one event
pub fn infer_trend(
    trend: &str,
    reduced_dir: &Path,
    layout_dir: &Path,
    output_dir: &Path,
    solver: &dyn BlockModelSolver,
    config: &InferenceConfig,
) -> Result<EventResult> {
    let layout_path = layout_dir.join(format!("{}{}", trend, LAYOUT_SUFFIX));
    if !layout_path.exists() {
        return Err(PipelineError::MissingLayout {
            trend: trend.to_string(),
            path: layout_path,
        }
        .into());
    }
    let network_path = reduced_dir.join(format!("{}{}", trend, REDUCED_SUFFIX));
    if !network_path.exists() {
        return Err(PipelineError::MissingNetwork {
            trend: trend.to_string(),
            path: network_path,
        }
        .into());
    }

    let layout = load_layout(&layout_path)?;
    if layout.len() < config.min_layout_nodes {
        return Err(PipelineError::UndersizedLayout {
            trend: trend.to_string(),
            nodes: layout.len(),
            min: config.min_layout_nodes,
        }
        .into());
    }

    let graph = load_edge_list(&network_path)?;
    let result = infer_event(trend, &graph, &layout, solver, config)?;

    write_block_assignment(
        &result.assignment,
        &output_dir.join(format!("{}{}", trend, ASSIGNMENT_SUFFIX)),
    )?;

    Ok(result)
}

/// Infer every event that has a reduced network or a layout.
///
/// Invalid settings abort before any event is touched.
/// Stats rows go to a single recorder thread; any event failure is logged
/// with its class and the batch moves on.
pub fn run_inference(
    reduced_dir: &Path,
    layout_dir: &Path,
    output_dir: &Path,
    solver: &dyn BlockModelSolver,
    config: &InferenceConfig,
) -> Result<BatchSummary> {
    config.validate()?;
    fs::create_dir_all(output_dir)?;

    let networks: BTreeSet<String> = discover_events(reduced_dir, REDUCED_SUFFIX)?.into_iter().collect();
    let layouts: BTreeSet<String> = discover_events(layout_dir, LAYOUT_SUFFIX)?.into_iter().collect();

    let unmatched: Vec<&String> = layouts.difference(&networks).collect();
    if unmatched.is_empty() {
        log::info!("Sanity check passed");
    } else {
        for trend in &unmatched {
            log::warn!("{}: layout has no reduced network", trend);
        }
    }

    let trends: Vec<String> = networks.union(&layouts).cloned().collect();
    log::info!("{} networks to process", trends.len());

    let (tx, recorder) = StatsRecorder::create(&output_dir.join(EVENT_STATS_FILE))?.spawn();

    let statuses: Vec<EventStatus> = trends
        .par_iter()
        .map(|trend| match infer_trend(trend, reduced_dir, layout_dir, output_dir, solver, config) {
            Ok(result) => {
                if tx.send(EventStatsRow::from(&result)).is_err() {
                    log::error!("{}: stats recorder is gone, row lost", trend);
                }
                EventStatus::Accepted
            }
            Err(e) => match e.downcast_ref::<PipelineError>() {
                Some(pe @ PipelineError::AllRunsFailed { .. }) => {
                    log::error!("{} [{}]", pe, pe.class());
                    EventStatus::Failed
                }
                Some(pe) => {
                    log::warn!("{} [{}]", pe, pe.class());
                    EventStatus::Skipped
                }
                None => {
                    log::error!("{}: inference failed: {:#}", trend, e);
                    EventStatus::Failed
                }
            },
        })
        .collect();

    drop(tx);
    let rows = recorder
        .join()
        .map_err(|_| anyhow::anyhow!("stats recorder thread panicked"))??;

    let summary = BatchSummary::tally(&statuses);
    log::info!(
        "Inference done: {} rows written, {} skipped, {} failed",
        rows,
        summary.skipped,
        summary.failed
    );
    save_summary(&summary, output_dir, "inference_summary.json")?;
    Ok(summary)
}
