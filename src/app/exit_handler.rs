//! Exit code logic for the downloader process.
//!
//! Single responsibility: map batch totals to the process exit outcome.

use audiobook_core::BatchSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from succeeded and failed counts.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Outcome for a finished batch; an interrupted batch is never a success.
pub(crate) fn exit_for_summary(summary: &BatchSummary) -> ProcessExit {
    if summary.cancelled_count > 0 {
        return if summary.success_count > 0 {
            ProcessExit::Partial
        } else {
            ProcessExit::Failure
        };
    }
    determine_exit_outcome(summary.success_count, summary.failure_count)
}
