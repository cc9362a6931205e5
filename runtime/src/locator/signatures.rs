//! Fixed markers of the storefront's search pages: URLs, selectors and the
//! text signatures of error and empty-result pages.

use crate::renderer::js_string;

pub const ORIGIN: &str = "https://www.coupang.com";
const SEARCH_PATH: &str = "https://www.coupang.com/np/search";

/// Result list items. Present once the list has rendered.
pub const LIST_SELECTOR: &str = "#product-list > li[data-id]";

/// Body text that only appears on browser or edge error pages.
const ERROR_BODY_MARKERS: &[&str] = &[
    "Secure Connection Failed",
    "NS_ERROR_NET_INTERRUPT",
    "Stream error in the HTTP/2 framing layer",
    "ERR_",
    "HTTP2_PROTOCOL_ERROR",
];

const ERROR_TITLE_MARKERS: &[&str] = &["Error", "오류"];

/// "No search results for ..." banner text.
pub const NO_RESULT_TEXT: &str = "에 대한 검색결과가 없습니다";

/// Pagination containers, most specific first.
const PAGINATION_CONTAINERS: &[&str] = &[
    r#"[class*="Pagination_pagination"]"#,
    ".pagination",
    r#"[class*="pagination"]"#,
];

/// Search URL for the first result page of `keyword`.
pub fn search_url(keyword: &str, page_size: u32) -> String {
    let list_size = page_size.to_string();
    match url::Url::parse_with_params(
        SEARCH_PATH,
        [
            ("q", keyword),
            ("channel", "user"),
            ("failRedirectApp", "true"),
            ("page", "1"),
            ("listSize", list_size.as_str()),
        ],
    ) {
        Ok(url) => url.to_string(),
        // SEARCH_PATH is a valid absolute URL.
        Err(_) => format!("{SEARCH_PATH}?page=1&listSize={list_size}"),
    }
}

/// Whether the rendered page is an error page rather than search results.
pub fn is_error_page(body_text: &str, title: &str) -> bool {
    ERROR_BODY_MARKERS.iter().any(|m| body_text.contains(m))
        || ERROR_TITLE_MARKERS.iter().any(|m| title.contains(m))
}

/// After the result list failed to appear: whether the URL or title points to
/// an error page (blocking) instead of a layout change.
pub fn is_error_location(url: &str, title: &str) -> bool {
    url.contains("error") || title.contains("Error")
}

/// Selector of the pagination link for `page`.
pub fn page_link_selector(page: u32) -> String {
    format!(r#"a[data-page="{page}"]"#)
}

/// Script that scrolls the pagination bar into view.
pub fn scroll_pagination_script() -> String {
    let lookups: Vec<String> = PAGINATION_CONTAINERS
        .iter()
        .map(|sel| format!("document.querySelector({})", js_string(sel)))
        .collect();
    format!(
        "(() => {{ const el = {}; if (el) {{ el.scrollIntoView({{ behavior: 'smooth', block: 'center' }}); }} return !!el; }})()",
        lookups.join(" || ")
    )
}

/// Predicate that holds once the location's `page` parameter equals `page`.
pub fn page_param_predicate(page: u32) -> String {
    format!("new URLSearchParams(window.location.search).get('page') === '{page}'")
}

/// The `page` query parameter of `url`, if any.
pub fn page_param(url: &str) -> Option<u32> {
    let parsed = url::Url::parse(url).ok()?;
    let value = parsed
        .query_pairs()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.into_owned())?;
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encodes_keyword() {
        let url = search_url("삼성 갤럭시버즈", 72);
        assert!(url.starts_with("https://www.coupang.com/np/search?q="));
        assert!(url.contains("channel=user"));
        assert!(url.contains("listSize=72"));
        assert!(!url.contains(' '));

        let parsed = url::Url::parse(&url).unwrap();
        let q = parsed.query_pairs().find(|(k, _)| k == "q").unwrap().1;
        assert_eq!(q, "삼성 갤럭시버즈");
        assert_eq!(page_param(&url), Some(1));
    }

    #[test]
    fn test_error_page_markers() {
        assert!(is_error_page("net::ERR_HTTP2_PROTOCOL_ERROR", ""));
        assert!(is_error_page("Secure Connection Failed", ""));
        assert!(is_error_page("", "500 Error"));
        assert!(is_error_page("", "일시적인 오류"));
        assert!(!is_error_page("무선이어폰 검색 결과", "쿠팡!"));
    }

    #[test]
    fn test_error_location() {
        assert!(is_error_location("https://www.coupang.com/error?code=403", ""));
        assert!(is_error_location("https://www.coupang.com/np/search", "Access Error"));
        assert!(!is_error_location("https://www.coupang.com/np/search", "쿠팡!"));
    }

    #[test]
    fn test_pagination_scripts() {
        assert_eq!(page_link_selector(3), r#"a[data-page="3"]"#);
        assert!(page_param_predicate(4).contains("=== '4'"));
        assert!(scroll_pagination_script().contains("Pagination_pagination"));
    }
}
