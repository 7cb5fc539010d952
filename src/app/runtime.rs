//! Top-level flow: parse arguments, load config, set up logging, dispatch.

use anyhow::Result;
use audiobook_core::PipelineConfig;
use clap::Parser;
use tracing::{debug, info};

use crate::app::terminal;
use crate::app_config::{self, LoadedConfig};
use crate::cli::{Cli, Command, RunArgs};
use crate::{ProcessExit, commands};

pub(crate) async fn run_downloader() -> Result<ProcessExit> {
    // Parse before tracing so --help works without logs.
    let cli = Cli::parse();

    let loaded = app_config::load_config(cli.config.as_deref())?;
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| loaded.config.app.log_file.clone());
    let no_color = terminal::should_disable_color(
        cli.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(
        terminal::default_log_level(cli.quiet, cli.verbose),
        no_color,
        log_file.as_deref(),
    )?;

    debug!(?cli, "CLI arguments parsed");
    match &loaded.path {
        Some(path) if loaded.loaded_from_file => {
            info!(config = %path.display(), "Loaded config file");
        }
        _ => debug!("No config file, using defaults"),
    }

    match &cli.command {
        Command::Run(args) => {
            let paths = app_config::resolve_store_paths(&args.store, &loaded.config.app);
            let pipeline = effective_pipeline(&loaded, args)?;
            commands::run_batch_command(args, &paths, pipeline, cli.quiet).await
        }
        Command::Plan(args) => {
            let paths = app_config::resolve_store_paths(&args.store, &loaded.config.app);
            commands::run_plan_command(
                &args.catalog,
                &args.selection,
                &paths,
                &loaded.config.pipeline(),
            )?;
            Ok(ProcessExit::Success)
        }
        Command::Stats(args) => {
            let paths = app_config::resolve_store_paths(&args.store, &loaded.config.app);
            commands::run_stats_command(&paths)?;
            Ok(ProcessExit::Success)
        }
    }
}

/// File config with `run` overrides applied, validated as a whole.
fn effective_pipeline(loaded: &LoadedConfig, args: &RunArgs) -> Result<PipelineConfig> {
    let mut pipeline = loaded.config.pipeline();
    if let Some(max_retries) = args.max_retries {
        pipeline.retry.max_retries = u32::from(max_retries);
    }
    if let Some(max_candidates) = args.max_candidates {
        let max_candidates = usize::from(max_candidates);
        pipeline.orchestrator.max_candidates = max_candidates;
        pipeline.orchestrator.max_search_results =
            pipeline.orchestrator.max_search_results.max(max_candidates);
    }
    app_config::validate_pipeline(&pipeline)?;
    Ok(pipeline)
}
