//! Application configuration loading for CLI defaults.
//!
//! The config file is TOML. Top-level `[app]` holds paths for the binary;
//! the other tables map one-to-one onto [`PipelineConfig`]:
//!
//! ```toml
//! [app]
//! output_dir = "/srv/audiobooks"
//!
//! [retry]
//! max_retries = 5
//!
//! [orchestrator]
//! inter_record_pause_ms = 5000
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use audiobook_core::PipelineConfig;
use audiobook_core::config::{
    LayoutConfig, OrchestratorConfig, RetryConfig, SearchConfig, TransferConfig,
};
use audiobook_core::progress::DEFAULT_PROGRESS_FILE;
use serde::Deserialize;

use crate::cli::StoreArgs;

/// Directory name under the config home.
const APP_DIR_NAME: &str = "audiobook-downloader";

/// Output root used when neither the CLI nor the config file names one.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Paths owned by the binary rather than the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    pub output_dir: Option<PathBuf>,
    pub progress_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub app: AppSection,
    pub retry: RetryConfig,
    pub search: SearchConfig,
    pub layout: LayoutConfig,
    pub orchestrator: OrchestratorConfig,
    pub transfer: TransferConfig,
}

impl FileConfig {
    /// Splits off the pipeline part.
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            retry: self.retry.clone(),
            search: self.search.clone(),
            layout: self.layout.clone(),
            orchestrator: self.orchestrator.clone(),
            transfer: self.transfer.clone(),
        }
    }

    /// Validates values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_pipeline(&self.pipeline())
    }
}

/// Checks ranges the library assumes but cannot express in types.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let retry = &config.retry;
    if retry.max_retries > 10 {
        bail!(
            "Invalid config value for `retry.max_retries`: {}. Expected range: 0..=10",
            retry.max_retries
        );
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        bail!(
            "Invalid config: `retry.base_delay_ms` ({}) exceeds `retry.max_delay_ms` ({})",
            retry.base_delay_ms,
            retry.max_delay_ms
        );
    }

    let orchestrator = &config.orchestrator;
    if !(1..=20).contains(&orchestrator.max_candidates) {
        bail!(
            "Invalid config value for `orchestrator.max_candidates`: {}. Expected range: 1..=20",
            orchestrator.max_candidates
        );
    }
    if orchestrator.max_search_results < orchestrator.max_candidates {
        bail!(
            "Invalid config: `orchestrator.max_search_results` ({}) is below `orchestrator.max_candidates` ({})",
            orchestrator.max_search_results,
            orchestrator.max_candidates
        );
    }

    let search = &config.search;
    if search.query_templates.is_empty() {
        bail!("Invalid config: `search.query_templates` must not be empty");
    }
    if search.trusted_domains.is_empty() {
        bail!("Invalid config: `search.trusted_domains` must not be empty");
    }
    if !(1..=300).contains(&search.web_timeout_secs) {
        bail!(
            "Invalid config value for `search.web_timeout_secs`: {}. Expected range: 1..=300",
            search.web_timeout_secs
        );
    }

    if config.layout.max_filename_chars < 20 {
        bail!(
            "Invalid config value for `layout.max_filename_chars`: {}. Expected at least 20",
            config.layout.max_filename_chars
        );
    }
    if config.transfer.program.trim().is_empty() {
        bail!("Invalid config: `transfer.program` must not be empty");
    }

    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if one is known.
    pub path: Option<PathBuf>,
    pub config: FileConfig,
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/audiobook-downloader/config.toml`
/// 2. `$HOME/.config/audiobook-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(APP_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` (which must exist) or the default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Output root and progress file after CLI > file > default resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub output_dir: PathBuf,
    pub progress_file: PathBuf,
}

/// Resolves store paths; the progress file defaults to living inside the
/// output root.
#[must_use]
pub fn resolve_store_paths(args: &StoreArgs, app: &AppSection) -> StorePaths {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| app.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let progress_file = args
        .progress_file
        .clone()
        .or_else(|| app.progress_file.clone())
        .unwrap_or_else(|| output_dir.join(DEFAULT_PROGRESS_FILE));
    StorePaths {
        output_dir,
        progress_file,
    }
}
