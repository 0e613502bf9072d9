//! benchgrid - cached benchmark experiment runner
//!
//! Entry point for the benchgrid binary: parses the CLI, loads the
//! configuration, and drives the library executors with the built-in
//! synthetic evaluator.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use benchgrid::cache::CacheStore;
use benchgrid::cli::{Cli, Commands, ConfigSubcommand, FilterArgs};
use benchgrid::config::{self, RunnerConfig};
use benchgrid::error::{Error, Result};
use benchgrid::evaluator::{MatrixRegistry, SyntheticCatalog, SyntheticEvaluator};
use benchgrid::executor::{self, ExperimentContext};
use benchgrid::logging;
use benchgrid::matrix;
use benchgrid::remote::{self, SshShell};
use benchgrid::types::{HostSlot, Task};
use benchgrid::version::{self, ENGINE_VERSION};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    // Commands that don't need the full config/logging stack
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        Commands::Matrix { filter, tasks } => {
            logging::init_simple(tracing::Level::WARN)?;
            return print_matrix(filter, *tasks);
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Run { config, .. } | Commands::Remote { config, .. } => config.clone(),
        _ => None,
    };

    let config = RunnerConfig::load(config_path.as_deref())?;

    // The guards must be kept alive for the lifetime of the program.
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting benchgrid"
    );

    match cli.command {
        Commands::Run {
            filter,
            workers,
            cache_dir,
            no_cache,
            ..
        } => run_local(&config, &filter, workers, cache_dir, no_cache),
        Commands::RunOne {
            dataset,
            model,
            method,
            metric,
            cache_dir,
            no_cache,
        } => run_one(
            &config,
            Task::new(dataset, model, method, metric),
            cache_dir,
            no_cache,
        ),
        Commands::Remote {
            filter,
            hosts,
            cache_dir,
            no_status,
            ..
        } => run_remote(&config, &filter, hosts, cache_dir, no_status, cli.quiet),
        Commands::Version | Commands::Config { .. } | Commands::Matrix { .. } => {
            // Already handled above
            unreachable!();
        }
    }
}

/// Assemble the experiment context with the built-in synthetic evaluator
fn build_context(
    config: &RunnerConfig,
    cache_dir: Option<String>,
    no_cache: bool,
) -> Result<Arc<ExperimentContext>> {
    let dir = cache_dir.unwrap_or_else(|| config.cache.dir.clone());
    let cache = CacheStore::open(&dir)?;
    Ok(Arc::new(ExperimentContext {
        cache,
        catalog: Arc::new(SyntheticCatalog::new()),
        evaluator: Arc::new(SyntheticEvaluator::new()),
        registry: MatrixRegistry::from_matrix(),
        engine_version: ENGINE_VERSION.to_string(),
        use_cache: config.cache.use_cache && !no_cache,
    }))
}

/// Run the filtered matrix on local workers
fn run_local(
    config: &RunnerConfig,
    filter: &FilterArgs,
    workers: Option<usize>,
    cache_dir: Option<String>,
    no_cache: bool,
) -> Result<()> {
    let ctx = build_context(config, cache_dir, no_cache)?;
    let workers = match workers {
        Some(0) | None => config.local_workers(),
        Some(n) => n,
    };
    info!(workers = workers, "running local batch");

    let runtime = build_runtime()?;
    let results =
        runtime.block_on(executor::run_experiments(ctx, &filter.to_filter(), workers))?;

    println!("Completed {} experiments.", results.len());
    Ok(())
}

/// Run a single experiment and report its cache key. This is the entry
/// point the remote dispatcher invokes over ssh.
fn run_one(
    config: &RunnerConfig,
    task: Task,
    cache_dir: Option<String>,
    no_cache: bool,
) -> Result<()> {
    let ctx = build_context(config, cache_dir, no_cache)?;
    let key = ctx.cache_key(&task);
    executor::run_experiment(&ctx, &task)?;
    println!("{}", ctx.cache.path_for(&key).display());
    Ok(())
}

/// Dispatch the filtered matrix across remote hosts
fn run_remote(
    config: &RunnerConfig,
    filter: &FilterArgs,
    hosts: Vec<String>,
    cache_dir: Option<String>,
    no_status: bool,
    quiet: bool,
) -> Result<()> {
    let entries = if hosts.is_empty() {
        config.remote.hosts.clone()
    } else {
        hosts
    };
    if entries.is_empty() {
        return Err(Error::ConfigValidation {
            message: "no remote hosts given; pass --host or set remote.hosts".to_string(),
            field: Some("remote.hosts".to_string()),
        });
    }
    let hostslots = HostSlot::parse_all(&entries)?;

    let dir = cache_dir.unwrap_or_else(|| config.cache.dir.clone());
    let cache = CacheStore::open(&dir)?;
    let registry = MatrixRegistry::from_matrix();
    let tasks = matrix::experiments(&filter.to_filter());
    let batch_config = config.batch_config(!no_status && !quiet);

    let runtime = build_runtime()?;
    let summary = runtime.block_on(remote::run_remote_experiments(
        cache,
        Arc::new(SshShell::new()),
        &registry,
        batch_config,
        tasks,
        hostslots,
        ENGINE_VERSION,
    ))?;

    // Terminate the \r status line before the summary.
    println!();
    println!(
        "Completed {} of {} experiments ({} failed).",
        summary.done, summary.total, summary.failed
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// List the matrix identifiers, or every task with `--tasks`
fn print_matrix(filter: &FilterArgs, tasks: bool) -> Result<()> {
    let selected = matrix::experiments(&filter.to_filter());

    if tasks {
        for task in &selected {
            println!("{}", task);
        }
        println!();
        println!("{} tasks.", selected.len());
        return Ok(());
    }

    println!("Datasets: {}", matrix::known_datasets().join(", "));
    println!("Models:   {}", matrix::known_models().join(", "));
    println!("Methods:  {}", matrix::known_methods().join(", "));
    println!("Metrics:  {}", matrix::known_metrics().join(", "));
    println!();
    println!("{} tasks match the filter.", selected.len());
    Ok(())
}

/// Build the multi-threaded async runtime
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("benchgrid")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = RunnerConfig::load(config.as_deref())?;
            config::show_config(&cfg)?;
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            RunnerConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
