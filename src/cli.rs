//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Find, download and organize audiobooks from a plain-text catalog.
///
/// Each catalog line names a book; the downloader searches several sources
/// for a full-length recording, retries through upstream blocking, and files
/// the audio under `<output>/<genre>/<author>[/<series>]`. Completed books are
/// remembered, so a run can be repeated safely.
#[derive(Parser, Debug)]
#[command(name = "audiobook-downloader")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/audiobook-downloader/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search, download and organize the books of a catalog
    Run(RunArgs),
    /// Show parsed records and their destinations without any network access
    Plan(PlanArgs),
    /// Summarize what the progress file says is already downloaded
    Stats(StatsArgs),
}

/// Where downloads and the progress file live.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Root directory for downloaded books
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Progress file (default: <output-dir>/download_progress.json)
    #[arg(long, value_name = "PATH")]
    pub progress_file: Option<PathBuf>,
}

/// Which catalog records to process.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Skip records whose id is below this
    #[arg(long, value_name = "ID")]
    pub start_from: Option<u32>,

    /// Skip records whose id is above this
    #[arg(long, value_name = "ID")]
    pub end_at: Option<u32>,

    /// Process only the record with this id
    #[arg(long, value_name = "ID", conflicts_with_all = ["start_from", "end_at"])]
    pub id: Option<u32>,

    /// Process at most this many records (after the id filters)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Catalog file, one book per line
    pub catalog: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Retries per candidate and failure class (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Candidates attempted per book (1-20)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub max_candidates: Option<u8>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Catalog file, one book per line
    pub catalog: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
