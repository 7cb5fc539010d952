//! Multi-strategy candidate search with relevance filtering.
//!
//! [`CandidateSearcher`] turns one [`BookRecord`] into an ordered list of
//! unique candidate URLs. It renders several query strategies from most to
//! least specific, runs each against a [`SearchBackend`], filters every raw
//! hit through [`RelevanceFilter`], and accumulates survivors until enough
//! were found. When configured it tops the list up with a direct media
//! platform lookup, whose entries are checked against a minimum duration.
//!
//! Search never fails from the caller's point of view: per-strategy errors
//! are logged and skipped, and an unavailable backend yields an empty list.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audiobook_core::catalog::parse_catalog;
//! use audiobook_core::config::PipelineConfig;
//! use audiobook_core::search::{CandidateSearcher, DefaultSearchBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let backend = DefaultSearchBackend::new(&config.search, &config.transfer)?;
//! let searcher = CandidateSearcher::new(Arc::new(backend), config.search.clone());
//!
//! let parsed = parse_catalog("1. Фрэнк Герберт - Дюна");
//! let urls = searcher.search(&parsed.records[0], 5).await;
//! println!("{} candidates", urls.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod filter;
mod media;
mod web;

pub use error::SearchError;
pub use filter::RelevanceFilter;
pub use media::MediaPlatformSearch;
pub use web::WebSearch;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::catalog::BookRecord;
use crate::config::{SearchConfig, TransferConfig};

/// Hits requested from the text backend per strategy.
const HITS_PER_STRATEGY: usize = 10;

/// Fewest strategies generated per record.
const MIN_STRATEGIES: usize = 3;

/// One raw text search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// One raw media platform entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub url: String,
    /// 0 when the platform did not report a duration.
    pub duration_seconds: u64,
    pub title: String,
}

/// Whether a candidate's host is on the trusted allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustTier {
    Trusted,
    Unknown,
}

/// Relevance evidence gathered for one hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelevanceSignals {
    pub matched_author: bool,
    pub matched_title: bool,
    /// An audiobook keyword appears in the hit.
    pub matched_genre_keyword: bool,
    pub excluded_term_present: bool,
}

/// A candidate source, produced and consumed within one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub url: String,
    pub trust_tier: TrustTier,
    /// 0 when unknown.
    pub duration_seconds: u64,
    pub signals: RelevanceSignals,
}

/// Search capability consumed by [`CandidateSearcher`].
///
/// This trait uses `async_trait` so the searcher can hold an
/// `Arc<dyn SearchBackend>` and tests can substitute scripted backends.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs a web text query.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the query could not be executed.
    async fn search_text(&self, query: &str, max_results: usize)
    -> Result<Vec<TextHit>, SearchError>;

    /// Runs a platform-native media query.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the query could not be executed.
    async fn search_media_platform(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MediaEntry>, SearchError>;
}

/// Production backend: HTML web search plus `yt-dlp` platform search.
#[derive(Debug)]
pub struct DefaultSearchBackend {
    web: WebSearch,
    media: MediaPlatformSearch,
}

impl DefaultSearchBackend {
    /// # Errors
    ///
    /// Returns [`SearchError`] when the web endpoint is invalid or the HTTP
    /// client cannot be built.
    pub fn new(search: &SearchConfig, transfer: &TransferConfig) -> Result<Self, SearchError> {
        Ok(Self {
            web: WebSearch::new(search)?,
            media: MediaPlatformSearch::new(transfer.program.clone()),
        })
    }
}

#[async_trait]
impl SearchBackend for DefaultSearchBackend {
    async fn search_text(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<TextHit>, SearchError> {
        self.web.search_text(query, max_results).await
    }

    async fn search_media_platform(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MediaEntry>, SearchError> {
        self.media.search(query, max_results).await
    }
}

/// Produces ranked, deduplicated candidate URLs for a record.
pub struct CandidateSearcher {
    backend: Arc<dyn SearchBackend>,
    filter: RelevanceFilter,
    config: SearchConfig,
}

impl CandidateSearcher {
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>, config: SearchConfig) -> Self {
        Self {
            backend,
            filter: RelevanceFilter::new(&config),
            config,
        }
    }

    /// Web query strategies for `record`, most specific first.
    ///
    /// Templates naming an empty narrator or genre are skipped. At least
    /// three and at most `max_strategies` (never more than eight) distinct
    /// queries are returned.
    #[must_use]
    pub fn strategies(&self, record: &BookRecord) -> Vec<String> {
        let max = self.config.max_strategies.clamp(MIN_STRATEGIES, 8);
        let mut queries: Vec<String> = Vec::new();

        let fallbacks = [
            record.search_query(&self.config.audiobook_keyword),
            record.full_title(),
            format!("{} {}", record.author, record.title),
        ];

        for query in self
            .config
            .query_templates
            .iter()
            .filter_map(|template| self.render(template, record))
        {
            if queries.len() >= max {
                break;
            }
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
        for query in fallbacks {
            if queries.len() >= MIN_STRATEGIES {
                break;
            }
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
        queries
    }

    /// Platform-native queries for the direct media lookup.
    #[must_use]
    pub fn media_queries(&self, record: &BookRecord) -> Vec<String> {
        let mut queries: Vec<String> = Vec::new();
        for query in self
            .config
            .media_query_templates
            .iter()
            .filter_map(|template| self.render(template, record))
        {
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
        queries
    }

    /// Renders one template, or `None` when it needs a field the record lacks.
    fn render(&self, template: &str, record: &BookRecord) -> Option<String> {
        let narrator = record.narrator().unwrap_or_default();
        if template.contains("{narrator}") && narrator.is_empty() {
            return None;
        }
        if template.contains("{genre}") && record.category.is_empty() {
            return None;
        }

        let rendered = template
            .replace("{full_title}", &record.full_title())
            .replace("{author}", &record.author)
            .replace("{title}", &record.title)
            .replace("{narrator}", narrator)
            .replace("{keyword}", &self.config.audiobook_keyword)
            .replace("{genre}", &record.category);
        let collapsed = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
        (!collapsed.is_empty()).then_some(collapsed)
    }

    /// Ordered unique candidate URLs for `record`, at most `max_results`.
    pub async fn search(&self, record: &BookRecord, max_results: usize) -> Vec<String> {
        self.search_candidates(record, max_results)
            .await
            .into_iter()
            .map(|candidate| candidate.url)
            .collect()
    }

    /// Like [`search`](Self::search), keeping trust and relevance details.
    #[instrument(skip(self, record), fields(record_id = record.id))]
    pub async fn search_candidates(
        &self,
        record: &BookRecord,
        max_results: usize,
    ) -> Vec<SearchCandidate> {
        let mut found: Vec<SearchCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, query) in self.strategies(record).iter().enumerate() {
            if found.len() >= max_results {
                break;
            }
            match self.backend.search_text(query, HITS_PER_STRATEGY).await {
                Ok(hits) => {
                    let before = found.len();
                    for hit in &hits {
                        if found.len() >= max_results {
                            break;
                        }
                        let candidate = self.filter.evaluate(record, hit);
                        if self.filter.accepts(&candidate) && seen.insert(candidate.url.clone()) {
                            found.push(candidate);
                        }
                    }
                    debug!(
                        strategy = index,
                        query = %query,
                        hits = hits.len(),
                        accepted = found.len() - before,
                        "strategy finished"
                    );
                }
                Err(e) if e.is_unavailable() => {
                    warn!(error = %e, "web search unavailable, skipping remaining strategies");
                    break;
                }
                Err(e) => {
                    warn!(strategy = index, query = %query, error = %e, "search strategy failed");
                }
            }
        }

        if self.config.media_platform_fallback && found.len() < max_results {
            let remaining = max_results - found.len();
            for candidate in self.media_candidates(record, remaining).await {
                if found.len() >= max_results {
                    break;
                }
                if seen.insert(candidate.url.clone()) {
                    found.push(candidate);
                }
            }
        }

        info!(candidates = found.len(), "search finished");
        found
    }

    /// Direct media platform lookup, filtered by minimum duration and
    /// excluded terms.
    pub async fn search_media_platform(
        &self,
        record: &BookRecord,
        max_results: usize,
    ) -> Vec<String> {
        self.media_candidates(record, max_results)
            .await
            .into_iter()
            .map(|candidate| candidate.url)
            .collect()
    }

    #[instrument(skip(self, record), fields(record_id = record.id))]
    async fn media_candidates(
        &self,
        record: &BookRecord,
        max_results: usize,
    ) -> Vec<SearchCandidate> {
        let mut found: Vec<SearchCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let per_query = self.config.media_results_per_query.max(1);

        for query in self.media_queries(record) {
            if found.len() >= max_results {
                break;
            }
            match self.backend.search_media_platform(&query, per_query).await {
                Ok(entries) => {
                    for entry in &entries {
                        if found.len() >= max_results {
                            break;
                        }
                        let candidate = self.filter.evaluate_media(record, entry);
                        if !self.filter.accepts_media(&candidate) {
                            debug!(
                                url = %entry.url,
                                duration = entry.duration_seconds,
                                "rejecting platform entry"
                            );
                            continue;
                        }
                        if seen.insert(candidate.url.clone()) {
                            found.push(candidate);
                        }
                    }
                }
                Err(e) if e.is_unavailable() => {
                    warn!(error = %e, "platform search unavailable");
                    break;
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "platform query failed");
                }
            }
        }

        found
    }
}
