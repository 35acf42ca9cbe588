//! CLI Argument Structures
//!
//! Command and flag definitions for the badcode binary. Flags given on the
//! command line override the loaded configuration file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use badcode_rs::BadcodeConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mine repository histories for deleted code patterns
#[derive(Parser)]
#[command(name = "badcode")]
#[command(version = VERSION)]
#[command(about = "Mine repository histories for code patterns that keep getting deleted")]
#[command(long_about = "
Learn which syntax patterns developers tend to delete, then flag them in review.

Common Usage:

  # Mine a list of repositories into data/stats/<repo>/stats.db
  badcode mine --repo-list repos.txt

  # Merge, rank and prune the reduced statistics
  badcode postprocess

  # Both steps at once
  badcode train golang/example kubernetes/klog

  # Show the strongest patterns
  badcode inspect --top 20

  # Serve review comments over JSON-RPC
  badcode serve --port 9930
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML)
    #[arg(short, long, global = true, env = "BADCODE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mine repositories and reduce their statistics
    Mine(MineArgs),

    /// Merge, rank and prune mined statistics
    Postprocess(PostprocessArgs),

    /// Mine and postprocess in one go
    Train(TrainArgs),

    /// Print the top-ranked patterns
    Inspect(InspectArgs),

    /// Run the review server
    Serve(ServeArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Repository selection and mining overrides
#[derive(Args, Clone, Default)]
pub struct MineArgs {
    /// Repository names (e.g. `owner/name`)
    pub repositories: Vec<String>,

    /// File listing one repository per line
    #[arg(long)]
    pub repo_list: Option<PathBuf>,

    /// Data directory holding repositories and statistics
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Branch reference to mine
    #[arg(long)]
    pub branch: Option<String>,

    /// Repositories mined concurrently
    #[arg(long)]
    pub workers: Option<usize>,
}

impl MineArgs {
    /// Apply flag overrides to `config`
    pub fn apply(&self, config: &mut BadcodeConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.io.data_dir = data_dir.clone();
        }
        if let Some(branch) = &self.branch {
            config.mining.branch = branch.clone();
        }
        if let Some(workers) = self.workers {
            config.mining.repository_workers = workers;
        }
    }
}

/// Postprocessing overrides
#[derive(Args, Clone, Default)]
pub struct PostprocessArgs {
    /// Raw statistics file [default: <data_dir>/stats.db]
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Minimum blended score kept by pruning
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Maximum edit cost for generalization
    #[arg(long)]
    pub max_edit_distance: Option<u32>,
}

impl PostprocessArgs {
    /// Apply flag overrides to `config`
    pub fn apply(&self, config: &mut BadcodeConfig) {
        if let Some(min_score) = self.min_score {
            config.postprocess.min_score = min_score;
        }
        if let Some(distance) = self.max_edit_distance {
            config.postprocess.max_edit_distance = distance;
        }
    }
}

/// Arguments of `train`
#[derive(Args, Clone, Default)]
pub struct TrainArgs {
    #[command(flatten)]
    pub mine: MineArgs,

    /// Minimum blended score kept by pruning
    #[arg(long)]
    pub min_score: Option<f64>,
}

/// Arguments of `inspect`
#[derive(Args, Clone, Default)]
pub struct InspectArgs {
    /// Pattern set [default: pruned stage of <data_dir>/stats.db]
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Number of patterns to show [default: postprocess.top_k]
    #[arg(short = 'k', long)]
    pub top: Option<usize>,

    /// Also print each pattern's tree
    #[arg(long)]
    pub trees: bool,
}

/// Arguments of `serve`
#[derive(Args, Clone, Default)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Pattern set [default: pruned stage of <data_dir>/stats.db]
    #[arg(long)]
    pub model: Option<PathBuf>,
}

impl ServeArgs {
    /// Apply flag overrides to `config`
    pub fn apply(&self, config: &mut BadcodeConfig) {
        if let Some(host) = &self.host {
            config.serve.host = host.clone();
        }
        if let Some(port) = self.port {
            config.serve.port = port;
        }
    }
}

/// Arguments of `validate-config`
#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to check
    pub file: PathBuf,

    /// Show every setting
    #[arg(long)]
    pub detailed: bool,
}
