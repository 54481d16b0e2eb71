//! URL extraction and HTML title search.
//!
//! Both are regex based; titles are best effort.

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL regex is valid"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("title regex is valid"));

/// Returns the first HTTP(S) URL in a chat message.
///
/// A scheme is required, so bare `www.example.com` does not match. Only the
/// first URL is returned even when the message holds several.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// Returns the trimmed contents of the first `<title>` element.
///
/// Whitespace runs inside the title (including newlines) collapse to a single
/// space so the result fits on one chat line. Empty titles yield `None`.
pub fn find_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_url() {
        assert_eq!(extract_url("visit https://x.test/y now"), Some("https://x.test/y"));
        assert_eq!(
            extract_url("http://a.test and https://b.test"),
            Some("http://a.test")
        );
    }

    #[test]
    fn test_scheme_is_required() {
        assert_eq!(extract_url("see www.example.com"), None);
        assert_eq!(extract_url("ftp://files.test/x"), None);
        assert_eq!(extract_url(""), None);
    }

    #[test]
    fn test_title_is_case_insensitive_and_trimmed() {
        assert_eq!(find_title("<html><TITLE> Hi </TITLE></html>").as_deref(), Some("Hi"));
    }

    #[test]
    fn test_title_spans_newlines() {
        let html = "<head><title>\n  Multi\n  Line\n</title></head>";
        assert_eq!(find_title(html).as_deref(), Some("Multi Line"));
    }

    #[test]
    fn test_first_title_wins() {
        let html = "<title>one</title><svg><title>two</title></svg>";
        assert_eq!(find_title(html).as_deref(), Some("one"));
    }

    #[test]
    fn test_missing_or_empty_title() {
        assert_eq!(find_title("<html><body>nothing</body></html>"), None);
        assert_eq!(find_title("<title>   </title>"), None);
        assert_eq!(find_title("<title>unterminated"), None);
    }
}
