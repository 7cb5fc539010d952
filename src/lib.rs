//! Audiobook Core Library
//!
//! This library provides the acquisition pipeline behind the audiobook
//! downloader: it turns a plain-text catalog of books into organized audio
//! files, searching several sources per book, riding out upstream blocking
//! with classified retries, and remembering what is already done so that a
//! run can be repeated safely.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Catalog parsing into [`BookRecord`] values
//! - [`config`] - Immutable pipeline configuration passed to every component
//! - [`download`] - Failure classification, retry/backoff and the transfer collaborator
//! - [`search`] - Multi-strategy candidate search with relevance filtering
//! - [`layout`] - Deterministic destination paths and filenames
//! - [`progress`] - Durable record of completed books
//! - [`orchestrator`] - Per-book workflow, batch runs and progress events

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod layout;
pub mod orchestrator;
pub mod progress;
pub mod search;
mod user_agent;

// Re-export commonly used types
pub use catalog::{BookRecord, CatalogError, CatalogParse, parse_catalog, parse_catalog_file};
pub use config::PipelineConfig;
pub use download::{
    DEFAULT_MAX_RETRIES, ErrorClassifier, FailureClass, QualityOptions, RetryPolicy, Transfer,
    TransferError, TransferOutcome, TransferTarget, YtDlpTransfer,
};
pub use layout::OutputLayoutPolicy;
pub use orchestrator::{
    AcquisitionOrchestrator, BatchSummary, CancellationFlag, Phase, ProgressEvent, RecordOutcome,
    RecordStatus,
};
pub use progress::{DownloadRecord, ProgressStore, StoreError};
pub use search::{CandidateSearcher, DefaultSearchBackend, SearchBackend, SearchError};
