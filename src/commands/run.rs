//! Run command: the full acquisition batch.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use audiobook_core::orchestrator::EventSender;
use audiobook_core::{
    AcquisitionOrchestrator, BatchSummary, BookRecord, CancellationFlag, CandidateSearcher,
    DefaultSearchBackend, OutputLayoutPolicy, PipelineConfig, ProgressStore, YtDlpTransfer,
    parse_catalog_file,
};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, progress_manager, terminal};
use crate::app::selection::select_records;
use crate::app_config::StorePaths;
use crate::cli::RunArgs;

/// Parses the catalog, builds the pipeline, runs the batch and reports.
pub async fn run_batch_command(
    args: &RunArgs,
    paths: &StorePaths,
    pipeline: PipelineConfig,
    quiet: bool,
) -> Result<ProcessExit> {
    let records = load_selection(args)?;
    if records.is_empty() {
        info!("No catalog records selected");
        return Ok(ProcessExit::Success);
    }

    let transfer = YtDlpTransfer::from_config(&pipeline.transfer);
    let version = transfer
        .version()
        .await
        .context("Transfer tool check failed")?;
    debug!(program = transfer.program(), %version, "transfer tool found");

    std::fs::create_dir_all(&paths.output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            paths.output_dir.display()
        )
    })?;
    let store = ProgressStore::open(&paths.progress_file).with_context(|| {
        format!(
            "Failed to open progress file '{}'",
            paths.progress_file.display()
        )
    })?;
    let already_done = records.iter().filter(|r| store.is_complete(r.id)).count();
    info!(
        selected = records.len(),
        already_done,
        output_dir = %paths.output_dir.display(),
        "Starting batch"
    );

    let backend = DefaultSearchBackend::new(&pipeline.search, &pipeline.transfer)
        .context("Failed to build search backend")?;
    let searcher = CandidateSearcher::new(Arc::new(backend), pipeline.search.clone());
    let layout = OutputLayoutPolicy::new(&paths.output_dir, pipeline.layout.clone());
    let (events, event_rx) = EventSender::channel();
    let mut orchestrator =
        AcquisitionOrchestrator::new(&pipeline, searcher, Arc::new(transfer), layout, store)
            .with_events(events);

    let cancel = CancellationFlag::new();
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current book");
            cancel_signal.cancel();
        }
    });

    let use_bar = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let ui = progress_manager::spawn_progress_ui(use_bar, records.len(), event_rx);

    let batch = tokio::spawn(async move {
        let summary = orchestrator.run_batch(&records, &cancel).await;
        // Dropping the orchestrator closes the event channel.
        drop(orchestrator);
        summary
    });
    let summary = batch.await.context("batch task failed")?;
    let rendered = ui.await.context("progress task failed")?;
    debug!(?rendered, "progress UI finished");

    print_summary(&summary, &paths.output_dir);

    if summary.cancelled_count > 0 {
        warn!(
            remaining = summary.cancelled_count,
            "Interrupted. Run again to resume."
        );
    }

    Ok(exit_handler::exit_for_summary(&summary))
}

fn load_selection(args: &RunArgs) -> Result<Vec<BookRecord>> {
    let catalog = parse_catalog_file(&args.catalog)
        .with_context(|| format!("Failed to read catalog '{}'", args.catalog.display()))?;
    for skipped in &catalog.skipped {
        warn!(%skipped, "Skipped catalog line");
    }
    let records = select_records(&catalog.records, &args.selection);
    info!(
        parsed = catalog.len(),
        selected = records.len(),
        skipped = catalog.skipped.len(),
        "Parsed catalog"
    );
    Ok(records)
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    let downloaded = summary.success_count - summary.skipped_count;
    println!(
        "Done: {downloaded} downloaded, {} already present, {} failed ({:.0?}).",
        summary.skipped_count, summary.failure_count, summary.elapsed
    );
    if summary.cancelled_count > 0 {
        println!("Interrupted: {} not finished", summary.cancelled_count);
    }
    for outcome in summary.failures() {
        let reason = outcome.error.as_deref().unwrap_or("no usable source found");
        println!("  failed #{} {}: {}", outcome.record_id, outcome.title, reason);
    }
    println!("Output: {}", output_dir.display());
}
