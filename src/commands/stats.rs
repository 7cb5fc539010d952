//! Stats command: summarize the progress file.

use std::fs;

use anyhow::{Context, Result};
use audiobook_core::progress::{ProgressStore, StoreSummary, TIMESTAMP_FORMAT};

use crate::app_config::StorePaths;

/// Prints totals, per-category counts, the latest completion, and how much
/// of the recorded audio is still on disk.
pub fn run_stats_command(paths: &StorePaths) -> Result<()> {
    let entries = ProgressStore::load(&paths.progress_file).with_context(|| {
        format!(
            "Failed to read progress file '{}'",
            paths.progress_file.display()
        )
    })?;

    if entries.is_empty() {
        println!(
            "No downloads recorded in {}.",
            paths.progress_file.display()
        );
        return Ok(());
    }

    let summary = StoreSummary::from_records(entries.iter().map(|(id, record)| (*id, record)));

    let mut present = 0usize;
    let mut total_bytes = 0u64;
    for record in entries.values().filter(|r| !r.is_legacy()) {
        if let Ok(meta) = fs::metadata(&record.file_path) {
            present += 1;
            total_bytes += meta.len();
        }
    }

    println!("progress_file = {}", paths.progress_file.display());
    println!("downloaded = {}", summary.total);
    if summary.legacy_entries > 0 {
        println!("legacy_entries = {}", summary.legacy_entries);
    }
    println!(
        "files_on_disk = {present} ({})",
        format_size(total_bytes)
    );
    if let Some((id, at)) = summary.latest {
        let title = entries.get(&id).map_or("", |r| r.title.as_str());
        println!("latest = #{id} {title} at {}", at.format(TIMESTAMP_FORMAT));
    }
    println!("by category:");
    for (category, count) in &summary.per_category {
        let label = if category.is_empty() {
            "(none)"
        } else {
            category.as_str()
        };
        println!("  {label}: {count}");
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;
    if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < GIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    }
}
