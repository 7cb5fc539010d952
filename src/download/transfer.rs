//! The transfer collaborator: fetch a media URL and extract its audio track.
//!
//! [`Transfer`] is the one capability the orchestrator needs from the outside
//! world to turn a candidate URL into a local file. [`YtDlpTransfer`] drives
//! the `yt-dlp` executable; tests substitute their own implementations.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::TransferError;
use crate::config::TransferConfig;

/// Marker `yt-dlp` puts in front of fatal error lines.
const TOOL_ERROR_PREFIX: &str = "ERROR:";

/// Output format and tool options for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOptions {
    /// Format selector (e.g. `bestaudio/best`).
    pub format: String,
    /// Audio codec to extract to (e.g. `mp3`).
    pub audio_format: String,
    /// Extractor quality (e.g. `192`).
    pub audio_quality: String,
    /// Extractor arguments forwarded verbatim.
    pub extractor_args: Option<String>,
    /// Network socket timeout, seconds.
    pub socket_timeout_secs: u64,
    /// Network retries performed inside the tool.
    pub tool_retries: u32,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl QualityOptions {
    #[must_use]
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            format: config.format.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
            extractor_args: config.extractor_args.clone(),
            socket_timeout_secs: config.socket_timeout_secs,
            tool_retries: config.tool_retries,
        }
    }
}

/// Where a transfer should land: a directory and a file stem without extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    pub directory: PathBuf,
    pub file_stem: String,
}

impl TransferTarget {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, file_stem: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_stem: file_stem.into(),
        }
    }

    /// `yt-dlp` output template: `<dir>/<stem>.%(ext)s`.
    #[must_use]
    pub fn output_template(&self) -> String {
        self.directory
            .join(format!("{}.%(ext)s", self.file_stem))
            .to_string_lossy()
            .into_owned()
    }

    /// Path the file has once extracted to `extension`.
    #[must_use]
    pub fn expected_path(&self, extension: &str) -> PathBuf {
        self.directory.join(format!("{}.{extension}", self.file_stem))
    }
}

/// A finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Final local file.
    pub path: PathBuf,
    /// Media duration reported by the source; 0 when unknown.
    pub duration_seconds: u64,
}

/// Fetch-and-extract capability consumed by the orchestrator.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Downloads `url` into `target` and extracts audio per `quality`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] describing why the transfer did not produce
    /// a file. The message of [`TransferError::Failed`] is what the
    /// classifier inspects.
    async fn fetch_and_extract(
        &self,
        url: &str,
        target: &TransferTarget,
        quality: &QualityOptions,
    ) -> Result<TransferOutcome, TransferError>;
}

/// Command for an external tool with stdin closed.
///
/// On unix the child gets its own process group, so a terminal Ctrl-C
/// reaches only this process and an attempt in flight runs to its end.
pub(crate) fn tool_command(program: &str) -> Command {
    let mut command = Command::new(program);
    command.stdin(Stdio::null()).kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    command
}

/// [`Transfer`] backed by the `yt-dlp` command line tool.
#[derive(Debug, Clone)]
pub struct YtDlpTransfer {
    program: String,
}

impl Default for YtDlpTransfer {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpTransfer {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.program.clone())
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `<program> --version` to confirm the tool is installed.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Unavailable`] when the program cannot be
    /// started, and [`TransferError::Failed`] when it exits unsuccessfully.
    pub async fn version(&self) -> Result<String, TransferError> {
        let output = tool_command(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|source| TransferError::Unavailable {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransferError::failed(
                "--version",
                failure_message(&stderr, output.status.code()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Arguments for one invocation; the final file path and duration are
    /// printed after post-processing as `<duration>\t<filepath>`.
    fn build_args(url: &str, target: &TransferTarget, quality: &QualityOptions) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            quality.format.clone(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            quality.audio_format.clone(),
            "--audio-quality".to_string(),
            quality.audio_quality.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-overwrites".to_string(),
            "--socket-timeout".to_string(),
            quality.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            quality.tool_retries.to_string(),
            "--output".to_string(),
            target.output_template(),
            "--print".to_string(),
            "after_move:%(duration)s\t%(filepath)s".to_string(),
        ];
        if let Some(extractor_args) = &quality.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_args.clone());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl Transfer for YtDlpTransfer {
    #[instrument(skip(self, target, quality), fields(program = %self.program, dir = %target.directory.display()))]
    async fn fetch_and_extract(
        &self,
        url: &str,
        target: &TransferTarget,
        quality: &QualityOptions,
    ) -> Result<TransferOutcome, TransferError> {
        let args = Self::build_args(url, target, quality);
        debug!(?args, "starting transfer tool");

        let output = tool_command(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| TransferError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let message = failure_message(&stderr, output.status.code());
            warn!(url, %message, "transfer tool reported failure");
            return Err(TransferError::failed(url, message));
        }

        let fallback = target.expected_path(&quality.audio_format);
        let outcome = parse_printed_outcome(&stdout, &fallback);
        if !outcome.path.exists() {
            return Err(TransferError::failed(
                url,
                format!("no output file at {}", outcome.path.display()),
            ));
        }

        debug!(path = %outcome.path.display(), duration = outcome.duration_seconds, "transfer finished");
        Ok(outcome)
    }
}

/// Picks the tool's own `ERROR:` lines out of stderr; falls back to the last
/// non-empty line, then to the exit code.
fn failure_message(stderr: &str, code: Option<i32>) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(TOOL_ERROR_PREFIX))
        .collect();
    if !errors.is_empty() {
        return errors.join("; ");
    }
    if let Some(last) = stderr.lines().map(str::trim).rev().find(|l| !l.is_empty()) {
        return last.to_string();
    }
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Parses the `<duration>\t<filepath>` line printed after post-processing.
fn parse_printed_outcome(stdout: &str, fallback: &Path) -> TransferOutcome {
    let printed = stdout
        .lines()
        .rev()
        .find_map(|line| line.trim_end().split_once('\t'));

    match printed {
        Some((duration, path)) if !path.trim().is_empty() => TransferOutcome {
            path: PathBuf::from(path.trim()),
            duration_seconds: parse_duration_seconds(duration),
        },
        Some((duration, _)) => TransferOutcome {
            path: fallback.to_path_buf(),
            duration_seconds: parse_duration_seconds(duration),
        },
        None => TransferOutcome {
            path: fallback.to_path_buf(),
            duration_seconds: 0,
        },
    }
}

/// Parses a duration printed as an integer or float; `NA` and garbage are 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_duration_seconds(raw: &str) -> u64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
        .map_or(0, |value| value.round() as u64)
}
