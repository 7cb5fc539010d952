//! Error types for the progress store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or updating the progress file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem I/O failed.
    #[error("progress file IO error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The progress file exists but is not a valid progress document.
    #[error(
        "progress file {path} is corrupt: {source}\n  Suggestion: fix the JSON by hand, or move the file aside to start with an empty history"
    )]
    CorruptState {
        /// Offending file.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// Another live process holds the store.
    #[error(
        "progress file {path} is in use by another run\n  Suggestion: wait for the other run to finish, or point --progress-file elsewhere"
    )]
    Locked {
        /// Store file whose lock is held.
        path: PathBuf,
    },

    /// The in-memory map could not be serialized.
    #[error("failed to serialize progress: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
