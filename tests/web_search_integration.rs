//! Web search backend against a mocked HTML endpoint.

mod support;

use std::sync::Arc;

use audiobook_core::config::SearchConfig;
use audiobook_core::search::WebSearch;
use audiobook_core::{CandidateSearcher, SearchError, parse_catalog};
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const RESULTS_PAGE: &str = r#"<html><body>
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Ddune1&amp;rut=a">Фрэнк Герберт - Дюна | аудиокнига</a>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Полная версия, читает Литвинов</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://audiobooks.example.net/dune">Дюна аудиокнига скачать</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://archive.org/details/dune-herbert">Герберт. Дюна (audiobook)</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://www.youtube.com/watch?v=trailer">Дюна аудиокнига трейлер</a>
</div>
</body></html>"#;

fn config_for(base_uri: &str) -> SearchConfig {
    SearchConfig {
        web_endpoint: format!("{base_uri}/html/"),
        web_min_interval_ms: 0,
        web_timeout_secs: 5,
        media_platform_fallback: false,
        ..SearchConfig::default()
    }
}

#[tokio::test]
async fn test_searcher_keeps_trusted_relevant_hits_in_page_order() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&server)
        .await;

    let config = config_for(&server.uri());
    let web = WebSearch::new(&config).expect("web search client");
    let searcher = CandidateSearcher::new(Arc::new(web), config);
    let record = parse_catalog("1. Фрэнк Герберт - Дюна")
        .records
        .remove(0);

    let urls = searcher.search(&record, 5).await;

    assert_eq!(
        urls,
        vec![
            "https://www.youtube.com/watch?v=dune1".to_string(),
            "https://archive.org/details/dune-herbert".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_web_search_sends_query_parameter() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "Дюна аудиокнига"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let web = WebSearch::new(&config_for(&server.uri())).expect("web search client");
    let hits = web
        .search_text("Дюна аудиокнига", 2)
        .await
        .expect("search succeeds");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://www.youtube.com/watch?v=dune1");
    assert_eq!(hits[0].snippet, "Полная версия, читает Литвинов");
}

#[tokio::test]
async fn test_web_search_error_status_is_reported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let web = WebSearch::new(&config_for(&server.uri())).expect("web search client");
    let result = web.search_text("anything", 10).await;

    assert!(matches!(result, Err(SearchError::HttpStatus { status: 503, .. })));
}

#[tokio::test]
async fn test_searcher_returns_empty_when_endpoint_fails() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config_for(&server.uri());
    let web = WebSearch::new(&config).expect("web search client");
    let searcher = CandidateSearcher::new(Arc::new(web), config);
    let record = parse_catalog("1. Фрэнк Герберт - Дюна")
        .records
        .remove(0);

    assert!(searcher.search(&record, 5).await.is_empty());
}
