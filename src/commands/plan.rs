//! Plan command: preview parsed records and where they would land.

use std::path::Path;

use anyhow::{Context, Result};
use audiobook_core::progress::{DownloadRecord, ProgressStore};
use audiobook_core::{OutputLayoutPolicy, PipelineConfig, parse_catalog_file};
use tracing::{info, warn};

use crate::app::selection::select_records;
use crate::app_config::StorePaths;
use crate::cli::SelectionArgs;

/// Prints one line per selected record: status, id, title and destination.
///
/// Reads the progress file without locking it, so it also works while a run
/// is in progress. No network access and nothing is written.
pub fn run_plan_command(
    catalog_path: &Path,
    selection: &SelectionArgs,
    paths: &StorePaths,
    pipeline: &PipelineConfig,
) -> Result<()> {
    let catalog = parse_catalog_file(catalog_path)
        .with_context(|| format!("Failed to read catalog '{}'", catalog_path.display()))?;
    for skipped in &catalog.skipped {
        warn!(%skipped, "Skipped catalog line");
    }

    let records = select_records(&catalog.records, selection);
    info!(
        parsed = catalog.len(),
        selected = records.len(),
        skipped = catalog.skipped.len(),
        "Parsed catalog (plan)"
    );

    let completed = ProgressStore::load(&paths.progress_file).with_context(|| {
        format!(
            "Failed to read progress file '{}'",
            paths.progress_file.display()
        )
    })?;
    let layout = OutputLayoutPolicy::new(&paths.output_dir, pipeline.layout.clone());

    println!(
        "Plan: {} record(s) selected, {} line(s) skipped.",
        records.len(),
        catalog.skipped.len()
    );

    let mut pending = 0usize;
    for record in &records {
        let done = completed.get(&record.id);
        if done.is_none() {
            pending += 1;
        }
        let destination = layout
            .placement_path_for(record)
            .join(layout.file_stem_for(record));
        println!(
            "- [{}] #{} {} -> {}",
            status_label(done),
            record.id,
            record.full_title(),
            destination.display()
        );
    }

    println!(
        "Plan summary: {pending} to download, {} already done.",
        records.len() - pending
    );
    println!("Plan only - nothing downloaded");
    Ok(())
}

fn status_label(done: Option<&DownloadRecord>) -> &'static str {
    match done {
        Some(_) => "done",
        None => "todo",
    }
}
