//! Web text search over an HTML search endpoint.
//!
//! The default endpoint is DuckDuckGo's HTML interface, which needs no API
//! key. Result links are wrapped in a redirect (`/l/?uddg=<target>`); the
//! target is unwrapped here so the filter sees the real host.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

use super::{SearchError, TextHit};
use crate::config::SearchConfig;
use crate::user_agent;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Query parameter carrying the real target of a redirect link.
const REDIRECT_TARGET_PARAM: &str = "uddg";

#[allow(clippy::expect_used)]
static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\b([^>]*\bclass="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a>"#)
        .expect("result link regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<(?:a|div|td)\b[^>]*\bclass="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#,
    )
    .expect("result snippet regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bhref="([^"]*)""#).expect("href regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid")); // Static pattern, safe to panic

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid")); // Static pattern, safe to panic

/// HTML search client.
#[derive(Debug)]
pub struct WebSearch {
    client: Client,
    endpoint: Url,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl WebSearch {
    /// Builds a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidEndpoint`] when the endpoint is not a
    /// URL, or [`SearchError::Unavailable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let endpoint =
            Url::parse(&config.web_endpoint).map_err(|e| SearchError::InvalidEndpoint {
                endpoint: config.web_endpoint.clone(),
                reason: e.to_string(),
            })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.web_timeout_secs))
            .user_agent(user_agent::default_search_user_agent())
            .gzip(true)
            .build()
            .map_err(|e| SearchError::web_unreachable(format!("HTTP client construction failed: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            min_interval: Duration::from_millis(config.web_min_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Runs one query and returns at most `max_results` hits in page order.
    ///
    /// Consecutive requests are spaced at least the configured interval apart.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Unavailable`] when the endpoint cannot be
    /// reached, [`SearchError::HttpStatus`] for non-success responses and
    /// [`SearchError::Network`] for other transport failures.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn search_text(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<TextHit>, SearchError> {
        self.wait_for_slot().await;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("q", query);

        let response = self.client.get(url).send().await.map_err(|source| {
            if source.is_connect() {
                SearchError::web_unreachable(source.to_string())
            } else {
                SearchError::Network {
                    query: query.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                query: query.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SearchError::Network {
            query: query.to_string(),
            source,
        })?;

        let hits = parse_result_page(&body, max_results);
        debug!(hits = hits.len(), "web search page parsed");
        Ok(hits)
    }

    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl super::SearchBackend for WebSearch {
    async fn search_text(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<TextHit>, SearchError> {
        WebSearch::search_text(self, query, max_results).await
    }

    async fn search_media_platform(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<super::MediaEntry>, SearchError> {
        Ok(Vec::new())
    }
}

/// Extracts result links, titles and snippets from a result page.
pub(crate) fn parse_result_page(html: &str, max_results: usize) -> Vec<TextHit> {
    let links: Vec<_> = RESULT_LINK.captures_iter(html).collect();
    let mut hits = Vec::new();

    for (index, caps) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let (Some(whole), Some(attrs), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Some(href) = HREF_ATTR
            .captures(attrs.as_str())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };
        let Some(url) = resolve_result_link(href) else {
            continue;
        };

        // The snippet belongs to this result if it sits before the next link.
        let region_end = links
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let snippet = RESULT_SNIPPET
            .captures(&html[whole.end()..region_end])
            .and_then(|c| c.get(1))
            .map(|m| clean_text(m.as_str()))
            .unwrap_or_default();

        hits.push(TextHit {
            url,
            title: clean_text(inner.as_str()),
            snippet,
        });
    }

    hits
}

/// Unwraps redirect links and rejects links that point back at the engine.
fn resolve_result_link(href: &str) -> Option<String> {
    let href = decode_entities(href.trim());
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href
    };
    let parsed = Url::parse(&absolute).ok()?;

    if let Some((_, target)) = parsed
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_TARGET_PARAM)
    {
        let target = target.into_owned();
        return Url::parse(&target).is_ok().then_some(target);
    }

    let is_engine_link = parsed
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"));
    let is_web = matches!(parsed.scheme(), "http" | "https");
    (is_web && !is_engine_link).then(|| parsed.to_string())
}

/// Strips tags, decodes common entities and collapses whitespace.
fn clean_text(fragment: &str) -> String {
    let without_tags = HTML_TAG.replace_all(fragment, "");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RUN.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc123&amp;rut=xyz">Фрэнк Герберт - <b>Дюна</b> | аудиокнига</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Полная версия, читает <b>Иван</b>&nbsp;Литвинов</a>
</div>
<div class="result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://archive.org/details/dune">Dune &amp; more</a>
  </h2>
</div>
<div class="result">
  <a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Ad</a>
</div>
"#;

    #[test]
    fn test_parse_result_page_unwraps_redirects() {
        let hits = parse_result_page(PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(hits[0].title, "Фрэнк Герберт - Дюна | аудиокнига");
        assert_eq!(hits[0].snippet, "Полная версия, читает Иван Литвинов");
    }

    #[test]
    fn test_parse_result_page_snippet_is_optional() {
        let hits = parse_result_page(PAGE, 10);
        assert_eq!(hits[1].url, "https://archive.org/details/dune");
        assert_eq!(hits[1].title, "Dune & more");
        assert!(hits[1].snippet.is_empty());
    }

    #[test]
    fn test_parse_result_page_respects_max() {
        assert_eq!(parse_result_page(PAGE, 1).len(), 1);
        assert!(parse_result_page("<html>no results</html>", 10).is_empty());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = SearchConfig {
            web_endpoint: "not a url".to_string(),
            ..SearchConfig::default()
        };
        let err = WebSearch::new(&config).unwrap_err();
        assert!(matches!(err, SearchError::InvalidEndpoint { .. }));
        assert!(err.is_unavailable());
    }
}
