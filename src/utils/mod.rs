//! Utility functions and helpers.

pub mod http;

use scraper::ElementRef;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// Links that already parse as absolute URLs are returned unchanged.
pub fn resolve_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text content of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.org").unwrap();
        assert_eq!(
            resolve_url(&base, "/open-call/42"),
            "https://example.org/open-call/42"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x?a=1"),
            "https://other.com/x?a=1"
        );
        assert_eq!(
            resolve_url(&base, "  /tools/item/7/ "),
            "https://example.org/tools/item/7/"
        );
    }

    #[test]
    fn test_resolve_url_keeps_absolute_text() {
        let base = Url::parse("https://example.org/path/").unwrap();
        assert_eq!(resolve_url(&base, "https://other.com"), "https://other.com");
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.org/path/page.html"
        );
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Youth\n\t Exchange  "), "Youth Exchange");
        assert_eq!(clean_text("\n \n"), "");
    }
}
