//! Direct media platform lookup through `yt-dlp` search.
//!
//! `yt-dlp "ytsearch5:<query>" --flat-playlist --dump-json` prints one JSON
//! object per entry without downloading anything; the entries carry duration
//! metadata, which the filter uses to reject trailers and single chapters.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{MediaEntry, SearchError};
use crate::download::tool_command;

/// URL prefix for entries that only carry a video id.
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Media platform search through the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct MediaPlatformSearch {
    program: String,
}

impl Default for MediaPlatformSearch {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Subset of a flat-playlist entry that the lookup reads.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
}

impl MediaPlatformSearch {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs one platform-native query.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Unavailable`] when the tool cannot be started
    /// and [`SearchError::Tool`] when it exits unsuccessfully.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MediaEntry>, SearchError> {
        let output = tool_command(&self.program)
            .arg(format!("ytsearch{max_results}:{query}"))
            .args(["--flat-playlist", "--dump-json", "--no-warnings", "--skip-download"])
            .output()
            .await
            .map_err(|e| SearchError::media_tool_missing(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .map(str::trim)
                .rfind(|line| !line.is_empty())
                .unwrap_or("no error output")
                .to_string();
            return Err(SearchError::Tool {
                query: query.to_string(),
                message,
            });
        }

        let entries = parse_entries(&String::from_utf8_lossy(&output.stdout), max_results);
        debug!(entries = entries.len(), "platform search finished");
        Ok(entries)
    }
}

/// Parses JSON-lines output; lines that are not entries are skipped.
pub(crate) fn parse_entries(stdout: &str, max_results: usize) -> Vec<MediaEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable platform search entry");
                None
            }
        })
        .filter_map(FlatEntry::into_media_entry)
        .take(max_results)
        .collect()
}

impl FlatEntry {
    fn into_media_entry(self) -> Option<MediaEntry> {
        let url = self
            .webpage_url
            .filter(|u| u.starts_with("http"))
            .or_else(|| self.url.filter(|u| u.starts_with("http")))
            .or_else(|| self.id.map(|id| format!("{WATCH_URL_PREFIX}{id}")))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let duration_seconds = self
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map_or(0, |d| d.round() as u64);
        Some(MediaEntry {
            url,
            duration_seconds,
            title: self.title.unwrap_or_default(),
        })
    }
}
