//! Immutable pipeline configuration.
//!
//! Every component receives its slice of [`PipelineConfig`] at construction
//! time; nothing reads ambient global state. All fields have defaults, so a
//! config file only needs to name the values it changes.

use std::time::Duration;

use serde::Deserialize;

/// Keyword appended to search queries when a template asks for `{keyword}`.
pub const DEFAULT_AUDIOBOOK_KEYWORD: &str = "аудиокнига";

/// Minimum accepted media duration (30 minutes).
pub const DEFAULT_MIN_DURATION_SECS: u64 = 1800;

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Failure classification and backoff constants.
    pub retry: RetryConfig,
    /// Query strategies and relevance filters.
    pub search: SearchConfig,
    /// Output directory layout constants.
    pub layout: LayoutConfig,
    /// Candidate caps and pauses.
    pub orchestrator: OrchestratorConfig,
    /// Options handed to the transfer tool.
    pub transfer: TransferConfig,
}

/// Retry and backoff constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries allowed per `(resource, failure class)` pair.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling for any single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay, in milliseconds.
    pub max_jitter_ms: u64,
    /// Case-insensitive substrings that mark upstream blocking.
    pub blocking_indicators: Vec<String>,
    /// Case-insensitive substrings that mark failures no retry can fix.
    pub fatal_indicators: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            max_jitter_ms: 1_000,
            blocking_indicators: strings(&[
                "HTTP Error 403",
                "HTTP Error 429",
                "Sign in to confirm",
                "Video unavailable",
                "Private video",
                "age-restricted",
                "SABR streaming",
            ]),
            fatal_indicators: strings(&["Unsupported URL", "is not a valid URL", "HTTP Error 404"]),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

/// Search strategy templates and relevance filters.
///
/// Templates may use `{author}`, `{title}`, `{full_title}`, `{narrator}`,
/// `{keyword}` and `{genre}`. A template naming `{narrator}` or `{genre}` is
/// skipped for records where that field is empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Keyword substituted for `{keyword}`.
    pub audiobook_keyword: String,
    /// Web query templates, most specific first.
    pub query_templates: Vec<String>,
    /// Upper bound on strategies generated per record.
    pub max_strategies: usize,
    /// Hosts accepted as candidate sources (subdomains match too).
    pub trusted_domains: Vec<String>,
    /// At least one of these must appear in a hit for it to count.
    pub audiobook_signals: Vec<String>,
    /// A hit containing any of these is rejected.
    pub excluded_terms: Vec<String>,
    /// Author/title tokens shorter than this are ignored when matching.
    pub min_token_chars: usize,
    /// Media platform queries, used by the direct platform lookup.
    pub media_query_templates: Vec<String>,
    /// Entries requested per media platform query.
    pub media_results_per_query: usize,
    /// Media entries shorter than this (seconds) are rejected.
    pub min_duration_secs: u64,
    /// Top up web results with the media platform lookup.
    pub media_platform_fallback: bool,
    /// HTML search endpoint used by the web backend.
    pub web_endpoint: String,
    /// Minimum spacing between two web search requests, in milliseconds.
    pub web_min_interval_ms: u64,
    /// Web search request timeout, in seconds.
    pub web_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            audiobook_keyword: DEFAULT_AUDIOBOOK_KEYWORD.to_string(),
            query_templates: strings(&[
                "\"{author} {title}\" {narrator} {keyword}",
                "\"{full_title}\" {keyword}",
                "\"{author} {title}\" {keyword} полная",
                "{author} {title} {keyword}",
                "{keyword} {author} {title} {genre}",
                "{title} {author} {keyword} слушать онлайн",
            ]),
            max_strategies: 8,
            trusted_domains: strings(&[
                "youtube.com",
                "youtu.be",
                "vk.com",
                "ok.ru",
                "archive.org",
                "soundcloud.com",
            ]),
            audiobook_signals: strings(&["аудиокнига", "audiobook", "audio"]),
            excluded_terms: strings(&[
                "краткое содержание",
                "пересказ",
                "анонс",
                "трейлер",
                "отрывок",
                "фрагмент",
                "summary",
                "trailer",
                "excerpt",
            ]),
            min_token_chars: 3,
            media_query_templates: strings(&[
                "{author} {title} {keyword} полная версия",
                "{author} {title} {keyword}",
                "{full_title}",
            ]),
            media_results_per_query: 5,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            media_platform_fallback: true,
            web_endpoint: "https://html.duckduckgo.com/html/".to_string(),
            web_min_interval_ms: 2_000,
            web_timeout_secs: 30,
        }
    }
}

/// Output layout constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Bucket used when no region/genre combination matches.
    pub default_bucket: String,
    /// Maximum filename length in characters (before the extension).
    pub max_filename_chars: usize,
    /// A series directory is created only when its name is longer than this.
    pub min_series_name_chars: usize,
    /// Category markers for foreign literature.
    pub foreign_markers: Vec<String>,
    /// Category markers for domestic literature.
    pub domestic_markers: Vec<String>,
    /// Category markers for speculative fiction.
    pub fantasy_markers: Vec<String>,
    /// Category markers for mystery/thriller.
    pub detective_markers: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_bucket: "russian_fantasy".to_string(),
            max_filename_chars: 150,
            min_series_name_chars: 3,
            foreign_markers: strings(&["зарубежная", "зарубеж", "foreign"]),
            domestic_markers: strings(&["российская", "русская", "russian"]),
            fantasy_markers: strings(&[
                "фантастика",
                "фэнтези",
                "мистика",
                "ужасы",
                "фанфики",
                "fantasy",
            ]),
            detective_markers: strings(&["детектив", "триллер", "боевик", "detective", "thriller"]),
        }
    }
}

/// Candidate caps and fixed pauses for the orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Candidates attempted per record.
    pub max_candidates: usize,
    /// Results requested from the searcher per record.
    pub max_search_results: usize,
    /// Pause between two candidates of the same record, in milliseconds.
    pub inter_candidate_pause_ms: u64,
    /// Pause between two records of a batch, in milliseconds.
    pub inter_record_pause_ms: u64,
    /// Pause before retrying a transient failure, in milliseconds.
    pub transient_retry_pause_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            max_search_results: 5,
            inter_candidate_pause_ms: 2_000,
            inter_record_pause_ms: 3_000,
            transient_retry_pause_ms: 2_000,
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn inter_candidate_pause(&self) -> Duration {
        Duration::from_millis(self.inter_candidate_pause_ms)
    }

    #[must_use]
    pub fn inter_record_pause(&self) -> Duration {
        Duration::from_millis(self.inter_record_pause_ms)
    }

    #[must_use]
    pub fn transient_retry_pause(&self) -> Duration {
        Duration::from_millis(self.transient_retry_pause_ms)
    }
}

/// Options for the `yt-dlp` transfer tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Executable name or path.
    pub program: String,
    /// `yt-dlp` format selector.
    pub format: String,
    /// Audio codec to extract to.
    pub audio_format: String,
    /// Audio quality passed to the extractor (e.g. `192`).
    pub audio_quality: String,
    /// Value for `--extractor-args`, if any.
    pub extractor_args: Option<String>,
    /// Socket timeout in seconds.
    pub socket_timeout_secs: u64,
    /// Network retries performed by the tool itself.
    pub tool_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
            extractor_args: Some("youtube:player_client=android,web".to_string()),
            socket_timeout_secs: 30,
            tool_retries: 3,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
