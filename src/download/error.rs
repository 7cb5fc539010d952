//! Error types for the transfer collaborator.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching and extracting audio.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transfer tool could not be started at all.
    #[error(
        "transfer tool '{program}' could not be started: {source}\n  Suggestion: install yt-dlp (https://github.com/yt-dlp/yt-dlp) and ensure it is on PATH"
    )]
    Unavailable {
        /// Executable that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported a failure.
    #[error("transfer of {url} failed: {message}")]
    Failed {
        /// Source URL.
        url: String,
        /// Failure message as reported by the tool.
        message: String,
    },

    /// The fetched media is shorter than the accepted minimum.
    #[error("{url} is too short ({duration_seconds}s < {min_seconds}s), not a complete work")]
    TooShort {
        /// Source URL.
        url: String,
        /// Reported media duration.
        duration_seconds: u64,
        /// Required minimum.
        min_seconds: u64,
    },

    /// Local filesystem error around the transfer.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Creates a `Failed` error from a tool message.
    #[must_use]
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
