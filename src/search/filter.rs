//! Relevance and trust filtering of raw search hits.

use url::Url;

use super::{MediaEntry, RelevanceSignals, SearchCandidate, TextHit, TrustTier};
use crate::catalog::BookRecord;
use crate::config::SearchConfig;

/// Decides which raw hits are plausible full audiobook sources.
///
/// A text hit survives when all of these hold:
/// - its host is in the trusted allow-list (subdomains included)
/// - it shares a token with the author or the title
/// - an audiobook keyword appears in it
/// - no excluded term appears in it
///
/// The text examined is the percent-decoded URL plus title plus snippet,
/// lowercased.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    trusted_domains: Vec<String>,
    audiobook_signals: Vec<String>,
    excluded_terms: Vec<String>,
    min_token_chars: usize,
    min_duration_secs: u64,
}

impl RelevanceFilter {
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            trusted_domains: lowercase_all(&config.trusted_domains),
            audiobook_signals: lowercase_all(&config.audiobook_signals),
            excluded_terms: lowercase_all(&config.excluded_terms),
            min_token_chars: config.min_token_chars,
            min_duration_secs: config.min_duration_secs,
        }
    }

    /// Trust tier of a URL's host.
    #[must_use]
    pub fn trust_tier(&self, url: &str) -> TrustTier {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        else {
            return TrustTier::Unknown;
        };

        let trusted = self.trusted_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if trusted {
            TrustTier::Trusted
        } else {
            TrustTier::Unknown
        }
    }

    /// Computes trust and relevance signals for a text hit.
    #[must_use]
    pub fn evaluate(&self, record: &BookRecord, hit: &TextHit) -> SearchCandidate {
        let decoded_url = urlencoding::decode(&hit.url)
            .map_or_else(|_| hit.url.clone(), std::borrow::Cow::into_owned);
        let text = format!("{decoded_url} {} {}", hit.title, hit.snippet).to_lowercase();

        SearchCandidate {
            url: hit.url.clone(),
            trust_tier: self.trust_tier(&hit.url),
            duration_seconds: 0,
            signals: self.signals_for(record, &text),
        }
    }

    /// Computes signals for a media platform entry (title only).
    #[must_use]
    pub fn evaluate_media(&self, record: &BookRecord, entry: &MediaEntry) -> SearchCandidate {
        let text = entry.title.to_lowercase();
        SearchCandidate {
            url: entry.url.clone(),
            trust_tier: self.trust_tier(&entry.url),
            duration_seconds: entry.duration_seconds,
            signals: self.signals_for(record, &text),
        }
    }

    /// Acceptance rule for text hits.
    #[must_use]
    pub fn accepts(&self, candidate: &SearchCandidate) -> bool {
        let signals = &candidate.signals;
        candidate.trust_tier == TrustTier::Trusted
            && (signals.matched_author || signals.matched_title)
            && signals.matched_genre_keyword
            && !signals.excluded_term_present
    }

    /// Acceptance rule for media platform entries: long enough and not an
    /// excerpt. Unknown duration (0) is rejected.
    #[must_use]
    pub fn accepts_media(&self, candidate: &SearchCandidate) -> bool {
        candidate.duration_seconds >= self.min_duration_secs.max(1)
            && !candidate.signals.excluded_term_present
    }

    fn signals_for(&self, record: &BookRecord, text: &str) -> RelevanceSignals {
        RelevanceSignals {
            matched_author: self.any_token_in(&record.author, text),
            matched_title: self.any_token_in(&record.title, text),
            matched_genre_keyword: self
                .audiobook_signals
                .iter()
                .any(|signal| text.contains(signal.as_str())),
            excluded_term_present: self
                .excluded_terms
                .iter()
                .any(|term| text.contains(term.as_str())),
        }
    }

    fn any_token_in(&self, field: &str, text: &str) -> bool {
        tokens(field, self.min_token_chars).any(|token| text.contains(token.as_str()))
    }
}

/// Lowercased alphanumeric tokens of at least `min_chars` characters.
fn tokens(field: &str, min_chars: usize) -> impl Iterator<Item = String> + '_ {
    field
        .split(|c: char| !c.is_alphanumeric())
        .filter(move |token| token.chars().count() >= min_chars)
        .map(str::to_lowercase)
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
