//! Per-book acquisition workflow.
//!
//! [`AcquisitionOrchestrator`] drives one record at a time through
//!
//! ```text
//! Pending -> Searching -> NoCandidates
//!                      -> Attempting -> Succeeded | Exhausted | Cancelled
//! ```
//!
//! consulting the [`ErrorClassifier`] and [`RetryPolicy`] after every failed
//! transfer, placing the result through the [`OutputLayoutPolicy`], and
//! recording completion in the [`ProgressStore`]. Work is strictly
//! sequential: every pause is awaited in line, so no two upstream requests
//! overlap.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audiobook_core::orchestrator::CancellationFlag;
//! use audiobook_core::{
//!     AcquisitionOrchestrator, CandidateSearcher, DefaultSearchBackend, OutputLayoutPolicy,
//!     PipelineConfig, ProgressStore, YtDlpTransfer, parse_catalog,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let backend = DefaultSearchBackend::new(&config.search, &config.transfer)?;
//! let searcher = CandidateSearcher::new(Arc::new(backend), config.search.clone());
//! let transfer = Arc::new(YtDlpTransfer::from_config(&config.transfer));
//! let layout = OutputLayoutPolicy::new("books", config.layout.clone());
//! let store = ProgressStore::open("download_progress.json")?;
//!
//! let mut orchestrator = AcquisitionOrchestrator::new(&config, searcher, transfer, layout, store);
//! let catalog = parse_catalog("1. Frank Herbert - Dune");
//! let summary = orchestrator
//!     .run_batch(&catalog.records, &CancellationFlag::new())
//!     .await;
//! println!("{} ok, {} failed", summary.success_count, summary.failure_count);
//! # Ok(())
//! # }
//! ```

mod events;
mod pause;

pub use events::{EventSender, Phase, ProgressEvent};
pub use pause::{PauseKind, Sleeper, TokioSleeper};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::catalog::BookRecord;
use crate::config::{OrchestratorConfig, PipelineConfig};
use crate::download::{
    ErrorClassifier, FailureClass, QualityOptions, RetryPolicy, Transfer, TransferError,
    TransferOutcome, TransferTarget,
};
use crate::layout::OutputLayoutPolicy;
use crate::progress::{DownloadRecord, ProgressStore};
use crate::search::CandidateSearcher;

/// Cooperative stop signal shared between the batch and its caller.
///
/// Checked before each record, before each candidate and before each retry.
/// An attempt already in flight runs to its end.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// Acquired in this run.
    Succeeded,
    /// Already present in the progress store; nothing was done.
    AlreadyComplete,
    NoCandidates,
    /// Every candidate failed.
    Exhausted,
    /// Acquired, but the progress store could not be updated.
    StoreFailed,
    /// Stopped by cancellation before a candidate succeeded.
    Cancelled,
}

impl RecordStatus {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::AlreadyComplete)
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        !self.is_success() && self != Self::Cancelled
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub record_id: u32,
    pub title: String,
    pub status: RecordStatus,
    /// Candidate that produced the file.
    pub source_url: Option<String>,
    pub file_path: Option<PathBuf>,
    /// Distinct candidates a transfer was attempted against.
    pub candidates_tried: usize,
    /// Last error seen, for failed records.
    pub error: Option<String>,
}

impl RecordOutcome {
    fn new(record: &BookRecord, status: RecordStatus) -> Self {
        Self {
            record_id: record.id,
            title: record.full_title(),
            status,
            source_url: None,
            file_path: None,
            candidates_tried: 0,
            error: None,
        }
    }
}

/// Totals for one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<RecordOutcome>,
    /// Records acquired or already complete.
    pub success_count: usize,
    pub failure_count: usize,
    /// Subset of `success_count` that was already complete.
    pub skipped_count: usize,
    /// Records interrupted or never started because the batch was cancelled.
    pub cancelled_count: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn push(&mut self, outcome: RecordOutcome) {
        if outcome.status.is_success() {
            self.success_count += 1;
        } else if outcome.status.is_failure() {
            self.failure_count += 1;
        } else {
            self.cancelled_count += 1;
        }
        if outcome.status == RecordStatus::AlreadyComplete {
            self.skipped_count += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Records started, including one interrupted by cancellation.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }
}

/// Single orchestrator parameterized by its classifier and retry policy.
///
/// A policy with `max_retries = 0` gives the plain "one try per candidate"
/// behavior; the default policy gives the resilient one.
pub struct AcquisitionOrchestrator {
    config: OrchestratorConfig,
    min_duration_secs: u64,
    quality: QualityOptions,
    searcher: CandidateSearcher,
    transfer: Arc<dyn Transfer>,
    classifier: ErrorClassifier,
    retry: RetryPolicy,
    layout: OutputLayoutPolicy,
    store: ProgressStore,
    sleeper: Arc<dyn Sleeper>,
    events: EventSender,
}

impl AcquisitionOrchestrator {
    /// Builds an orchestrator from `config` and its collaborators, with real
    /// pauses and no event consumer.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        searcher: CandidateSearcher,
        transfer: Arc<dyn Transfer>,
        layout: OutputLayoutPolicy,
        store: ProgressStore,
    ) -> Self {
        Self {
            config: config.orchestrator.clone(),
            min_duration_secs: config.search.min_duration_secs,
            quality: QualityOptions::from_config(&config.transfer),
            searcher,
            transfer,
            classifier: ErrorClassifier::new(&config.retry),
            retry: RetryPolicy::new(&config.retry),
            layout,
            store,
            sleeper: Arc::new(TokioSleeper),
            events: EventSender::disabled(),
        }
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Replaces the retry policy; the classifier is kept.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Consumes the orchestrator, releasing everything but the store.
    #[must_use]
    pub fn into_store(self) -> ProgressStore {
        self.store
    }

    /// Runs `records` in order, pausing between records that did real work.
    ///
    /// Per-record failures never abort the batch.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run_batch(
        &mut self,
        records: &[BookRecord],
        cancel: &CancellationFlag,
    ) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary::default();

        for (index, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                let remaining = records.len() - index;
                summary.cancelled_count += remaining;
                info!(remaining, "batch cancelled");
                break;
            }

            let outcome = self.process_record(record, cancel).await;
            let did_work = outcome.status != RecordStatus::AlreadyComplete;
            summary.push(outcome);

            let has_next = index + 1 < records.len();
            if did_work && has_next && !cancel.is_cancelled() {
                self.sleeper
                    .pause(PauseKind::InterRecord, self.config.inter_record_pause())
                    .await;
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            skipped = summary.skipped_count,
            "batch finished"
        );
        summary
    }

    /// Takes one record from `Pending` to a terminal state.
    ///
    /// Once `cancel` is set no new transfer starts for the record: the
    /// attempt in flight finishes, and if it failed the record ends
    /// [`RecordStatus::Cancelled`].
    #[instrument(skip_all, fields(record_id = record.id))]
    pub async fn process_record(
        &mut self,
        record: &BookRecord,
        cancel: &CancellationFlag,
    ) -> RecordOutcome {
        let id = record.id;

        if self.store.is_complete(id) {
            debug!("already complete, skipping");
            self.events
                .emit(id, Phase::Succeeded, format!("{record}: already downloaded"));
            return RecordOutcome::new(record, RecordStatus::AlreadyComplete);
        }

        self.events.emit(id, Phase::Pending, record.to_string());
        self.events
            .emit(id, Phase::Searching, format!("searching for {}", record.full_title()));

        let candidates = self
            .searcher
            .search(record, self.config.max_search_results)
            .await;
        if candidates.is_empty() {
            info!("no candidates found");
            self.events
                .emit(id, Phase::NoCandidates, format!("{record}: nothing found"));
            return RecordOutcome::new(record, RecordStatus::NoCandidates);
        }

        let target = TransferTarget::new(
            self.layout.placement_path_for(record),
            self.layout.file_stem_for(record),
        );
        let attempts: Vec<&String> = candidates.iter().take(self.config.max_candidates).collect();
        let mut outcome = RecordOutcome::new(record, RecordStatus::Exhausted);

        for (index, url) in attempts.iter().enumerate() {
            if index > 0 && !cancel.is_cancelled() {
                self.sleeper
                    .pause(PauseKind::InterCandidate, self.config.inter_candidate_pause())
                    .await;
            }
            if cancel.is_cancelled() {
                return self.cancelled(record, &target, outcome).await;
            }
            outcome.candidates_tried += 1;
            self.events.emit(
                id,
                Phase::Attempting,
                format!("candidate {}/{}: {url}", index + 1, attempts.len()),
            );

            match self.attempt_candidate(id, url, &target, cancel).await {
                Ok(transfer) => return self.complete(record, url, transfer, outcome),
                Err(e) => {
                    warn!(url = %url, error = %e, "candidate failed");
                    outcome.error = Some(e.to_string());
                }
            }
        }

        if cancel.is_cancelled() {
            return self.cancelled(record, &target, outcome).await;
        }
        remove_empty_dirs(&target.directory, self.layout.root()).await;
        self.events.emit(
            id,
            Phase::Exhausted,
            format!("{record}: all {} candidates failed", outcome.candidates_tried),
        );
        outcome
    }

    async fn cancelled(
        &self,
        record: &BookRecord,
        target: &TransferTarget,
        mut outcome: RecordOutcome,
    ) -> RecordOutcome {
        info!(candidates_tried = outcome.candidates_tried, "record interrupted by cancellation");
        remove_empty_dirs(&target.directory, self.layout.root()).await;
        self.events
            .emit(record.id, Phase::Cancelled, format!("{record}: interrupted"));
        outcome.status = RecordStatus::Cancelled;
        outcome
    }

    /// Transfers one candidate, repeating it while the policy allows.
    async fn attempt_candidate(
        &mut self,
        record_id: u32,
        url: &str,
        target: &TransferTarget,
        cancel: &CancellationFlag,
    ) -> Result<TransferOutcome, TransferError> {
        loop {
            let error = match self.transfer_once(url, target).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };
            if cancel.is_cancelled() {
                debug!("cancelled, not retrying candidate");
                return Err(error);
            }

            let class = self.classifier.classify_transfer_error(&error);
            let (kind, delay) = match class {
                FailureClass::Blocked if self.retry.should_retry(url, class) => {
                    let attempt_index = self.retry.attempts(url, class).saturating_sub(1);
                    (PauseKind::Backoff, self.retry.backoff_delay(attempt_index))
                }
                FailureClass::Transient if self.retry.should_retry(url, class) => {
                    (PauseKind::TransientRetry, self.config.transient_retry_pause())
                }
                _ => {
                    debug!(%class, "not retrying candidate");
                    return Err(error);
                }
            };

            info!(%class, delay_ms = delay.as_millis(), error = %error, "retrying candidate");
            self.events.emit(
                record_id,
                Phase::Retrying,
                format!("{class} failure, retrying in {}s", delay.as_secs()),
            );
            self.sleeper.pause(kind, delay).await;
            if cancel.is_cancelled() {
                debug!("cancelled during retry pause");
                return Err(error);
            }
        }
    }

    async fn transfer_once(
        &self,
        url: &str,
        target: &TransferTarget,
    ) -> Result<TransferOutcome, TransferError> {
        tokio::fs::create_dir_all(&target.directory)
            .await
            .map_err(|e| TransferError::io(&target.directory, e))?;

        let outcome = self
            .transfer
            .fetch_and_extract(url, target, &self.quality)
            .await?;

        // Zero means the source did not report a duration.
        if outcome.duration_seconds > 0 && outcome.duration_seconds < self.min_duration_secs {
            if let Err(e) = tokio::fs::remove_file(&outcome.path).await {
                debug!(path = %outcome.path.display(), error = %e, "could not remove short file");
            }
            return Err(TransferError::TooShort {
                url: url.to_string(),
                duration_seconds: outcome.duration_seconds,
                min_seconds: self.min_duration_secs,
            });
        }
        Ok(outcome)
    }

    fn complete(
        &mut self,
        record: &BookRecord,
        url: &str,
        transfer: TransferOutcome,
        mut outcome: RecordOutcome,
    ) -> RecordOutcome {
        let entry = DownloadRecord::completed_now(
            record.full_title(),
            url,
            record.category.clone(),
            transfer.path.clone(),
        );
        outcome.source_url = Some(url.to_string());
        outcome.file_path = Some(transfer.path.clone());

        if let Err(e) = self.store.record_complete(record.id, entry) {
            warn!(error = %e, "downloaded but could not record completion");
            self.events.emit(
                record.id,
                Phase::StoreFailed,
                format!("{record}: saved to {} but not recorded: {e}", transfer.path.display()),
            );
            outcome.status = RecordStatus::StoreFailed;
            outcome.error = Some(e.to_string());
            return outcome;
        }

        info!(path = %transfer.path.display(), "record complete");
        self.events.emit(
            record.id,
            Phase::Succeeded,
            format!("{record}: saved to {}", transfer.path.display()),
        );
        outcome.status = RecordStatus::Succeeded;
        outcome.error = None;
        outcome
    }
}

/// Removes `dir` and then each empty parent, stopping below `root` or at
/// the first directory that still has entries.
async fn remove_empty_dirs(dir: &Path, root: &Path) {
    let mut current = Some(dir);
    while let Some(path) = current {
        if path == root || !path.starts_with(root) {
            break;
        }
        if tokio::fs::remove_dir(path).await.is_err() {
            break;
        }
        debug!(path = %path.display(), "removed empty directory");
        current = path.parent();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::search::{MediaEntry, SearchBackend, SearchError, TextHit};

    /// Search backend returning the same hits for every query.
    struct FixedBackend {
        hits: Vec<TextHit>,
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn search_text(&self, _query: &str, _max: usize) -> Result<Vec<TextHit>, SearchError> {
            Ok(self.hits.clone())
        }

        async fn search_media_platform(
            &self,
            _query: &str,
            _max: usize,
        ) -> Result<Vec<MediaEntry>, SearchError> {
            Ok(Vec::new())
        }
    }

    /// Transfer replaying a script of results; writes a file on success.
    struct ScriptedTransfer {
        script: Mutex<VecDeque<Result<u64, String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransfer {
        fn new(script: Vec<Result<u64, &str>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map_err(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transfer for ScriptedTransfer {
        async fn fetch_and_extract(
            &self,
            url: &str,
            target: &TransferTarget,
            _quality: &QualityOptions,
        ) -> Result<TransferOutcome, TransferError> {
            self.calls.lock().unwrap().push(url.to_string());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(duration_seconds)) => {
                    let path = target.expected_path("mp3");
                    std::fs::write(&path, b"audio").unwrap();
                    Ok(TransferOutcome {
                        path,
                        duration_seconds,
                    })
                }
                Some(Err(message)) => Err(TransferError::failed(url, message)),
                None => Err(TransferError::failed(url, "script exhausted")),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        pauses: Mutex<Vec<PauseKind>>,
    }

    impl RecordingSleeper {
        fn count(&self, kind: PauseKind) -> usize {
            self.pauses.lock().unwrap().iter().filter(|k| **k == kind).count()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn pause(&self, kind: PauseKind, _duration: Duration) {
            self.pauses.lock().unwrap().push(kind);
        }
    }

    /// Transfer that raises the cancel flag while running, then finishes
    /// the way the tool does when it was interrupted or when it got through.
    struct CancellingTransfer {
        cancel: CancellationFlag,
        succeed: bool,
        calls: Mutex<usize>,
    }

    impl CancellingTransfer {
        fn new(cancel: &CancellationFlag, succeed: bool) -> Self {
            Self {
                cancel: cancel.clone(),
                succeed,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transfer for CancellingTransfer {
        async fn fetch_and_extract(
            &self,
            url: &str,
            target: &TransferTarget,
            _quality: &QualityOptions,
        ) -> Result<TransferOutcome, TransferError> {
            *self.calls.lock().unwrap() += 1;
            self.cancel.cancel();
            if self.succeed {
                let path = target.expected_path("mp3");
                std::fs::write(&path, b"audio").unwrap();
                return Ok(TransferOutcome {
                    path,
                    duration_seconds: 7200,
                });
            }
            Err(TransferError::failed(url, "ERROR: Interrupted by user"))
        }
    }

    fn record(id: u32) -> BookRecord {
        BookRecord {
            id,
            author: "Фрэнк Герберт".to_string(),
            title: "Дюна".to_string(),
            subtitle: None,
            narrator: None,
            year: None,
            category: "Зарубежная фантастика".to_string(),
        }
    }

    fn trusted_hit(n: u32) -> TextHit {
        TextHit {
            url: format!("https://www.youtube.com/watch?v=dune{n}"),
            title: "Фрэнк Герберт Дюна аудиокнига".to_string(),
            snippet: String::new(),
        }
    }

    struct Harness {
        dir: TempDir,
        orchestrator: AcquisitionOrchestrator,
        transfer: Arc<ScriptedTransfer>,
        sleeper: Arc<RecordingSleeper>,
    }

    fn build(
        dir: &TempDir,
        hits: Vec<TextHit>,
        transfer: Arc<dyn Transfer>,
        sleeper: Arc<dyn Sleeper>,
    ) -> AcquisitionOrchestrator {
        let mut config = PipelineConfig::default();
        config.search.media_platform_fallback = false;

        let searcher = CandidateSearcher::new(Arc::new(FixedBackend { hits }), config.search.clone());
        let layout = OutputLayoutPolicy::new(dir.path().join("books"), config.layout.clone());
        let store = ProgressStore::open(dir.path().join("progress.json")).unwrap();

        AcquisitionOrchestrator::new(&config, searcher, transfer, layout, store).with_sleeper(sleeper)
    }

    fn harness(hits: Vec<TextHit>, script: Vec<Result<u64, &str>>) -> Harness {
        let dir = TempDir::new().unwrap();
        let transfer = Arc::new(ScriptedTransfer::new(script));
        let sleeper = Arc::new(RecordingSleeper::default());
        let orchestrator = build(
            &dir,
            hits,
            Arc::clone(&transfer) as Arc<dyn Transfer>,
            Arc::clone(&sleeper) as Arc<dyn Sleeper>,
        );

        Harness {
            dir,
            orchestrator,
            transfer,
            sleeper,
        }
    }

    // ==================== Attempt Tests ====================

    #[tokio::test]
    async fn test_first_candidate_success_records_completion() {
        let mut h = harness(vec![trusted_hit(1)], vec![Ok(7200)]);
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Succeeded);
        assert_eq!(outcome.candidates_tried, 1);
        assert!(h.orchestrator.store().is_complete(1));
        let path = outcome.file_path.unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().contains("foreign_fantasy"));
    }

    #[tokio::test]
    async fn test_fatal_failure_advances_to_next_candidate() {
        let mut h = harness(
            vec![trusted_hit(1), trusted_hit(2)],
            vec![Err("ERROR: Unsupported URL: https://example.invalid"), Ok(0)],
        );
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Succeeded);
        assert_eq!(outcome.candidates_tried, 2);
        assert_eq!(h.sleeper.count(PauseKind::InterCandidate), 1);
        assert_eq!(h.sleeper.count(PauseKind::Backoff), 0);
        assert_eq!(
            outcome.source_url.as_deref(),
            Some("https://www.youtube.com/watch?v=dune2")
        );
    }

    #[tokio::test]
    async fn test_transient_failure_retries_same_candidate() {
        let mut h = harness(vec![trusted_hit(1)], vec![Err("connection reset"), Ok(3600)]);
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Succeeded);
        assert_eq!(h.sleeper.count(PauseKind::TransientRetry), 1);
        assert_eq!(h.transfer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blocked_budget_exhaustion_exhausts_record() {
        let mut h = harness(vec![trusted_hit(1)], vec![Err("HTTP Error 403: Forbidden"); 10]);
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Exhausted);
        // One initial attempt plus max_retries retries.
        assert_eq!(h.transfer.calls.lock().unwrap().len(), 4);
        assert_eq!(h.sleeper.count(PauseKind::Backoff), 3);
        assert!(outcome.error.unwrap().contains("403"));
        assert!(!h.orchestrator.store().is_complete(1));
    }

    #[tokio::test]
    async fn test_zero_retry_policy_tries_each_candidate_once() {
        let h = harness(
            vec![trusted_hit(1), trusted_hit(2)],
            vec![Err("HTTP Error 429"), Err("HTTP Error 429")],
        );
        let mut orchestrator = h.orchestrator.with_retry_policy(RetryPolicy::with_max_retries(0));
        let outcome = orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Exhausted);
        assert_eq!(h.transfer.calls.lock().unwrap().len(), 2);
        assert_eq!(h.sleeper.count(PauseKind::Backoff), 0);
    }

    #[tokio::test]
    async fn test_short_media_is_rejected_and_removed() {
        let mut h = harness(vec![trusted_hit(1)], vec![Ok(600)]);
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.status, RecordStatus::Exhausted);
        assert!(outcome.error.unwrap().contains("too short"));
        let leftovers: Vec<_> = walk_files(h.dir.path());
        assert!(leftovers.iter().all(|p| p.extension().is_none_or(|e| e != "mp3")));
    }

    #[tokio::test]
    async fn test_candidates_capped_at_max_candidates() {
        let hits = (1..=5).map(trusted_hit).collect();
        let mut h = harness(hits, vec![Err("ERROR: HTTP Error 404: Not Found"); 5]);
        let outcome = h.orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        assert_eq!(outcome.candidates_tried, 3);
        assert_eq!(h.transfer.calls.lock().unwrap().len(), 3);
    }

    // ==================== Event Tests ====================

    #[tokio::test]
    async fn test_events_follow_phase_order() {
        let h = harness(vec![trusted_hit(1)], vec![Ok(7200)]);
        let (events, mut rx) = EventSender::channel();
        let mut orchestrator = h.orchestrator.with_events(events);
        orchestrator.process_record(&record(1), &CancellationFlag::new()).await;

        let phases: Vec<Phase> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.phase)
            .collect();
        assert_eq!(
            phases,
            vec![
                Phase::Pending,
                Phase::Searching,
                Phase::Attempting,
                Phase::Succeeded
            ]
        );
    }

    // ==================== Batch Tests ====================

    #[tokio::test]
    async fn test_batch_pauses_between_worked_records_only() {
        let mut h = harness(vec![trusted_hit(1)], vec![Ok(7200); 3]);
        let records = vec![record(1), record(2), record(3)];
        let first = h.orchestrator.process_record(&records[0], &CancellationFlag::new()).await;
        assert_eq!(first.status, RecordStatus::Succeeded);

        let summary = h
            .orchestrator
            .run_batch(&records, &CancellationFlag::new())
            .await;

        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(summary.failure_count, 0);
        // Record 1 was skipped, record 2 worked and record 3 is last.
        assert_eq!(h.sleeper.count(PauseKind::InterRecord), 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops_before_next_record() {
        let mut h = harness(vec![trusted_hit(1)], vec![Ok(7200)]);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let summary = h
            .orchestrator
            .run_batch(&[record(1), record(2)], &cancel)
            .await;

        assert_eq!(summary.total(), 0);
        assert_eq!(summary.cancelled_count, 2);
        assert!(h.transfer.calls.lock().unwrap().is_empty());
    }

    // ==================== Cancellation Tests ====================

    #[tokio::test]
    async fn test_cancel_during_attempt_starts_no_further_transfer() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationFlag::new();
        let transfer = Arc::new(CancellingTransfer::new(&cancel, false));
        let sleeper = Arc::new(RecordingSleeper::default());
        let (events, mut rx) = EventSender::channel();
        let mut orchestrator = build(
            &dir,
            (1..=3).map(trusted_hit).collect(),
            Arc::clone(&transfer) as Arc<dyn Transfer>,
            Arc::clone(&sleeper) as Arc<dyn Sleeper>,
        )
        .with_events(events);

        let summary = orchestrator.run_batch(&[record(1), record(2)], &cancel).await;

        assert_eq!(transfer.calls(), 1);
        assert!(sleeper.pauses.lock().unwrap().is_empty());
        assert_eq!(summary.outcomes[0].status, RecordStatus::Cancelled);
        assert_eq!(summary.outcomes[0].candidates_tried, 1);
        assert_eq!(summary.cancelled_count, 2);
        assert_eq!(summary.failure_count, 0);
        assert_eq!(summary.failures().count(), 0);

        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().unwrap();
        assert_eq!(last.phase, Phase::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_successful_attempt_keeps_result() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationFlag::new();
        let transfer = Arc::new(CancellingTransfer::new(&cancel, true));
        let mut orchestrator = build(
            &dir,
            vec![trusted_hit(1), trusted_hit(2)],
            Arc::clone(&transfer) as Arc<dyn Transfer>,
            Arc::new(RecordingSleeper::default()),
        );

        let outcome = orchestrator.process_record(&record(1), &cancel).await;

        assert_eq!(outcome.status, RecordStatus::Succeeded);
        assert_eq!(transfer.calls(), 1);
        assert!(orchestrator.store().is_complete(1));
    }

    // ==================== Directory Cleanup Tests ====================

    #[tokio::test]
    async fn test_exhausted_record_leaves_no_empty_directories() {
        let mut h = harness(
            vec![trusted_hit(1), trusted_hit(2)],
            vec![Err("ERROR: HTTP Error 404: Not Found"); 2],
        );
        let outcome = h
            .orchestrator
            .process_record(&record(1), &CancellationFlag::new())
            .await;

        assert_eq!(outcome.status, RecordStatus::Exhausted);
        let books = h.dir.path().join("books");
        assert!(books.exists());
        assert_eq!(std::fs::read_dir(&books).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_directories_with_other_books() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("books");
        let author = root.join("foreign_fantasy").join("Frank_Herbert");
        let series = author.join("Dune");
        std::fs::create_dir_all(&series).unwrap();
        std::fs::write(author.join("Other Book.mp3"), b"audio").unwrap();

        remove_empty_dirs(&series, &root).await;

        assert!(!series.exists());
        assert!(author.exists());
        assert!(root.exists());
    }

    #[test]
    fn test_batch_summary_counts_failures() {
        let mut summary = BatchSummary::default();
        summary.push(RecordOutcome::new(&record(1), RecordStatus::Succeeded));
        summary.push(RecordOutcome::new(&record(2), RecordStatus::NoCandidates));
        summary.push(RecordOutcome::new(&record(3), RecordStatus::StoreFailed));
        summary.push(RecordOutcome::new(&record(4), RecordStatus::Cancelled));
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 2);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.failures().count(), 2);
    }

    fn walk_files(root: &std::path::Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }
}
