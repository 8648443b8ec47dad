//! Error types shared across the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single block-model fit.
///
/// A failed fit only removes that run from the ensemble.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("cannot fit a block model to an empty graph")]
    EmptyGraph,

    #[error("invalid block bounds: min {min} > max {max}")]
    InvalidBounds { min: usize, max: usize },

    #[error("objective is not finite after {sweeps} sweeps")]
    NonFiniteObjective { sweeps: usize },

    #[error("solver returned {found} labels for a graph with {expected} nodes")]
    LabelCountMismatch { expected: usize, found: usize },
}

/// Event-level failures. None of these abort a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event {trend}: no spatial layout found at {path}")]
    MissingLayout { trend: String, path: PathBuf },

    #[error("event {trend}: layout has {nodes} entries, need at least {min}")]
    UndersizedLayout { trend: String, nodes: usize, min: usize },

    #[error("event {trend}: no reduced network found at {path}")]
    MissingNetwork { trend: String, path: PathBuf },

    #[error("event {trend}: all {attempts} inference runs failed")]
    AllRunsFailed { trend: String, attempts: usize },

    #[error("{path}: row {row}: {message}")]
    InvalidRecord {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

impl PipelineError {
    /// Short failure-class label used in diagnostics and summaries.
    pub fn class(&self) -> &'static str {
        match self {
            PipelineError::MissingLayout { .. } | PipelineError::UndersizedLayout { .. } => {
                "missing-layout-correspondence"
            }
            PipelineError::MissingNetwork { .. } => "missing-network",
            PipelineError::AllRunsFailed { .. } => "solver-failure",
            PipelineError::InvalidRecord { .. } => "invalid-input",
        }
    }
}
