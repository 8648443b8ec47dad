//! Configuration management for the retweet block pipeline

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Block-model family fitted by the built-in solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockModel {
    /// One rate per ordered block pair
    Standard,
    /// One within-block rate and one between-block rate
    PlantedPartition,
}

/// Graph reduction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Minimum node count after pruning for an event to be kept
    pub min_nodes: usize,

    /// Repeat low-information pruning until nothing changes
    pub prune_to_fixed_point: bool,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            min_nodes: 50,
            prune_to_fixed_point: false,
        }
    }
}

/// Block-model inference and selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Number of independent solver runs per event
    pub n_runs: usize,

    /// Minimum silhouette score for a multi-block partition to be kept
    pub silhouette_threshold: f64,

    /// Minimum number of layout entries for an event to be scored
    pub min_layout_nodes: usize,

    /// Lower bound on the number of blocks
    pub min_blocks: Option<usize>,

    /// Upper bound on the number of blocks
    pub max_blocks: Option<usize>,

    /// Base seed; run `i` uses `seed + i`
    pub seed: u64,

    /// Block-model family
    pub model: BlockModel,

    /// Whether block rates are corrected for node strengths
    pub degree_corrected: bool,

    /// Annealed Gibbs sweeps per block count
    pub anneal_sweeps: usize,

    /// Maximum greedy sweeps after annealing
    pub greedy_sweeps: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            n_runs: 10,
            silhouette_threshold: 0.4,
            min_layout_nodes: 50,
            min_blocks: Some(1),
            max_blocks: Some(2),
            seed: 42,
            model: BlockModel::Standard,
            degree_corrected: true,
            anneal_sweeps: 20,
            greedy_sweeps: 50,
        }
    }
}

impl InferenceConfig {
    /// Reject settings under which no run could succeed
    pub fn validate(&self) -> Result<()> {
        ensure!(self.n_runs > 0, "n_runs must be at least 1");
        ensure!(
            self.silhouette_threshold.is_finite(),
            "silhouette_threshold must be finite, got {}",
            self.silhouette_threshold
        );
        if let (Some(min), Some(max)) = (self.min_blocks, self.max_blocks) {
            ensure!(min <= max, "min_blocks ({}) exceeds max_blocks ({})", min, max);
        }
        Ok(())
    }
}

/// Default configuration for the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reduction: ReductionConfig,
    pub inference: InferenceConfig,

    /// Number of worker threads (0 = use all available cores)
    pub threads: usize,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Worker thread count with 0 resolved to the number of cores
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            num_cpus::get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"inference": {"n_runs": 3, "model": "planted_partition"}}"#)
                .unwrap();
        assert_eq!(config.inference.n_runs, 3);
        assert_eq!(config.inference.model, BlockModel::PlantedPartition);
        assert_eq!(config.inference.silhouette_threshold, 0.4);
        assert_eq!(config.reduction.min_nodes, 50);
        assert!(!config.reduction.prune_to_fixed_point);
    }

    #[test]
    fn null_bounds_mean_unbounded() {
        let config: Config =
            serde_json::from_str(r#"{"inference": {"min_blocks": null, "max_blocks": null}}"#)
                .unwrap();
        assert_eq!(config.inference.min_blocks, None);
        assert_eq!(config.inference.max_blocks, None);
    }

    #[test]
    fn defaults_validate() {
        assert!(InferenceConfig::default().validate().is_ok());
        let unbounded = InferenceConfig {
            min_blocks: None,
            max_blocks: None,
            ..InferenceConfig::default()
        };
        assert!(unbounded.validate().is_ok());
    }

    #[test]
    fn raised_min_over_default_max_is_rejected() {
        let config = InferenceConfig {
            min_blocks: Some(3),
            ..InferenceConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_blocks (3) exceeds max_blocks (2)"));
    }

    #[test]
    fn zero_runs_are_rejected() {
        let config = InferenceConfig {
            n_runs: 0,
            ..InferenceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_threads_resolves_to_cores() {
        let config = Config::default();
        assert!(config.worker_threads() >= 1);
    }
}
