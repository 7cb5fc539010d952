//! Shared User-Agent string for outbound HTTP requests.

/// Product token used in the User-Agent header.
const PRODUCT_NAME: &str = "audiobook-downloader";

/// Default User-Agent for search requests.
///
/// HTML search endpoints serve reduced pages to clients without a browser-like
/// prefix, so the tool identifies itself inside a `compatible` comment.
#[must_use]
pub(crate) fn default_search_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Mozilla/5.0 (compatible; {PRODUCT_NAME}/{version})")
}
