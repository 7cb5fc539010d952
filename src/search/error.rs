//! Error types for search collaborators.

use thiserror::Error;

/// Errors returned by [`SearchBackend`](super::SearchBackend) implementations.
///
/// [`CandidateSearcher`](super::CandidateSearcher) never propagates these; it
/// logs them per strategy and carries on.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The collaborator is not installed or not reachable at all.
    #[error("{backend} search unavailable: {reason}\n  Suggestion: {suggestion}")]
    Unavailable {
        /// Which backend failed (`web` or `media`).
        backend: &'static str,
        /// What went wrong.
        reason: String,
        /// What the user can do about it.
        suggestion: &'static str,
    },

    /// Network-level failure for one query.
    #[error("search request for '{query}' failed: {source}")]
    Network {
        /// Query being executed.
        query: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The search endpoint answered with a non-success status.
    #[error("search for '{query}' returned HTTP {status}")]
    HttpStatus {
        /// Query being executed.
        query: String,
        /// HTTP status code.
        status: u16,
    },

    /// The media platform tool ran and failed.
    #[error("platform search for '{query}' failed: {message}")]
    Tool {
        /// Query being executed.
        query: String,
        /// Message reported by the tool.
        message: String,
    },

    /// The configured endpoint is not a usable URL.
    #[error("invalid search endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Parse failure.
        reason: String,
    },
}

impl SearchError {
    /// Returns true when the backend cannot serve any query this run.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::InvalidEndpoint { .. })
    }

    pub(crate) fn web_unreachable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: "web",
            reason: reason.into(),
            suggestion: "check network connectivity or the configured search endpoint",
        }
    }

    pub(crate) fn media_tool_missing(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: "media",
            reason: reason.into(),
            suggestion: "install yt-dlp and ensure it is on PATH",
        }
    }
}
