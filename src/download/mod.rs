//! Transfer of candidate media to disk, and the retry rules around it.
//!
//! This module provides the [`Transfer`] capability the orchestrator uses to
//! fetch a candidate URL and extract its audio, along with the
//! [`ErrorClassifier`] and [`RetryPolicy`] that decide what to do when an
//! attempt fails.
//!
//! # Example
//!
//! ```no_run
//! use audiobook_core::download::{QualityOptions, Transfer, TransferTarget, YtDlpTransfer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transfer = YtDlpTransfer::default();
//! let target = TransferTarget::new("./downloads", "Frank Herbert - Dune");
//! let outcome = transfer
//!     .fetch_and_extract("https://youtu.be/abc", &target, &QualityOptions::default())
//!     .await?;
//! println!("Saved {} ({}s)", outcome.path.display(), outcome.duration_seconds);
//! # Ok(())
//! # }
//! ```

mod error;
mod retry;
mod transfer;

pub use error::TransferError;
pub use retry::{DEFAULT_MAX_RETRIES, ErrorClassifier, FailureClass, RetryPolicy};
pub use transfer::{QualityOptions, Transfer, TransferOutcome, TransferTarget, YtDlpTransfer};
pub(crate) use transfer::tool_command;
