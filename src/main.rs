use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use retweet_blocks::cluster::BayesianBlockModel;
use retweet_blocks::config::{BlockModel, Config};
use retweet_blocks::pipeline;

#[derive(Parser, Debug)]
#[clap(
    name = "retweet-blocks",
    about = "Block-model detection of coordinated communities in retweet cascades"
)]
struct Cli {
    /// JSON configuration file; flags below override it
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, global = true)]
    threads: Option<usize>,

    /// Verbose logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce raw retweet networks to their structural core
    Reduce {
        /// Directory of `{trend}_rtn.csv` edge lists
        #[clap(long, default_value = "./data/rtn")]
        input_dir: PathBuf,

        /// Directory for reduced networks and stats
        #[clap(long, default_value = "./output/rtn")]
        output_dir: PathBuf,

        /// Minimum node count after pruning
        #[clap(long)]
        min_nodes: Option<usize>,

        /// Repeat pruning until no low-information node is left
        #[clap(long)]
        prune_to_fixed_point: bool,
    },

    /// Fit block models to reduced networks and select one partition per event
    Infer {
        /// Directory of `{trend}_rtn_pp.csv` reduced networks
        #[clap(long, default_value = "./output/rtn")]
        network_dir: PathBuf,

        /// Directory of `{trend}_fdl.csv` layouts
        #[clap(long, default_value = "./output/fdl")]
        layout_dir: PathBuf,

        /// Directory for block assignments and `sbm_stats.csv`
        #[clap(long, default_value = "./output/sbm")]
        output_dir: PathBuf,

        /// Solver runs per event
        #[clap(long)]
        runs: Option<usize>,

        /// Minimum silhouette score to keep a multi-block partition
        #[clap(long)]
        threshold: Option<f64>,

        #[clap(long)]
        min_blocks: Option<usize>,

        #[clap(long)]
        max_blocks: Option<usize>,

        /// Drop both block-count bounds; searches every count up to sqrt(N),
        /// which is slow on large networks
        #[clap(long, conflicts_with_all = ["min_blocks", "max_blocks"])]
        unbounded: bool,

        /// Base seed; run i uses seed + i
        #[clap(long)]
        seed: Option<u64>,

        /// Fit the planted-partition variant
        #[clap(long)]
        planted_partition: bool,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let num_threads = config.worker_threads();
    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    match args.command {
        Command::Reduce {
            input_dir,
            output_dir,
            min_nodes,
            prune_to_fixed_point,
        } => {
            if let Some(min_nodes) = min_nodes {
                config.reduction.min_nodes = min_nodes;
            }
            config.reduction.prune_to_fixed_point |= prune_to_fixed_point;

            log::info!("Input: {}", input_dir.display());
            log::info!("Output: {}", output_dir.display());
            pipeline::run_reduction(&input_dir, &output_dir, &config.reduction)?;
        }
        Command::Infer {
            network_dir,
            layout_dir,
            output_dir,
            runs,
            threshold,
            min_blocks,
            max_blocks,
            unbounded,
            seed,
            planted_partition,
        } => {
            let inference = &mut config.inference;
            if let Some(runs) = runs {
                inference.n_runs = runs;
            }
            if let Some(threshold) = threshold {
                inference.silhouette_threshold = threshold;
            }
            if unbounded {
                inference.min_blocks = None;
                inference.max_blocks = None;
            }
            if min_blocks.is_some() {
                inference.min_blocks = min_blocks;
            }
            if max_blocks.is_some() {
                inference.max_blocks = max_blocks;
            }
            if let Some(seed) = seed {
                inference.seed = seed;
            }
            if planted_partition {
                inference.model = BlockModel::PlantedPartition;
            }

            inference.validate()?;

            let solver = BayesianBlockModel::from_config(inference);
            log::info!(
                "Inference with {} runs, threshold {}, blocks {:?}..{:?}",
                inference.n_runs,
                inference.silhouette_threshold,
                inference.min_blocks,
                inference.max_blocks
            );
            pipeline::run_inference(&network_dir, &layout_dir, &output_dir, &solver, inference)?;
        }
    }

    log::info!("Done");

    Ok(())
}
