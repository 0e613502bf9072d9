//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for benchgrid.

use clap::{Args, Parser, Subcommand};

/// benchgrid - cached benchmark experiment runner
///
/// Runs an experiment matrix of (dataset, model, method, metric) tasks,
/// caching every scored result and optionally dispatching work across a
/// fleet of ssh-reachable hosts.
#[derive(Parser, Debug)]
#[command(name = "benchgrid")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Matrix filter shared by the batch commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only run tasks for this dataset
    #[arg(long)]
    pub dataset: Option<String>,

    /// Only run tasks for this model
    #[arg(long)]
    pub model: Option<String>,

    /// Only run tasks for this explanation method
    #[arg(long)]
    pub method: Option<String>,

    /// Only run tasks for this metric
    #[arg(long)]
    pub metric: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the filtered experiment matrix locally
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "BENCHGRID_CONFIG")]
        config: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Concurrent local workers (0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Cache directory override
        #[arg(long)]
        cache_dir: Option<String>,

        /// Recompute everything, ignoring cached results
        #[arg(long)]
        no_cache: bool,
    },

    /// Run a single experiment (invoked on remote hosts by `remote`)
    RunOne {
        /// Dataset identifier
        dataset: String,

        /// Model identifier
        model: String,

        /// Explanation method identifier
        method: String,

        /// Metric identifier
        metric: String,

        /// Cache directory override
        #[arg(long)]
        cache_dir: Option<String>,

        /// Recompute even if a cached result exists
        #[arg(long)]
        no_cache: bool,
    },

    /// Dispatch the filtered experiment matrix across remote hosts
    Remote {
        /// Path to configuration file
        #[arg(short, long, env = "BENCHGRID_CONFIG")]
        config: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Host slot 'hostname:remote_binary'; repeat for more slots
        /// (overrides the configured host list)
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Cache directory override
        #[arg(long)]
        cache_dir: Option<String>,

        /// Suppress the progress status line
        #[arg(long)]
        no_status: bool,
    },

    /// List the experiment matrix and known identifiers
    Matrix {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print every task instead of the identifier summary
        #[arg(long)]
        tasks: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

impl FilterArgs {
    pub fn to_filter(&self) -> crate::matrix::MatrixFilter {
        crate::matrix::MatrixFilter {
            dataset: self.dataset.clone(),
            model: self.model.clone(),
            method: self.method.clone(),
            metric: self.metric.clone(),
        }
    }
}
