//! Small string and URL helpers used across the pipeline.
//!
//! - String truncation for log fields
//! - Whitespace collapsing for text scraped out of markup
//! - Scheme and host check for press-release URLs

use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the first char boundary at or below `max` bytes
/// and get an ellipsis plus the count of bytes dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Collapse every run of whitespace (including non-breaking spaces) into a
/// single space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True for `http`/`https` URLs that carry a host.
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("(+18 bytes)"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("  Dr. Ruiz\n\t Highlights\u{a0}First 100 Days "),
            "Dr. Ruiz Highlights First 100 Days"
        );
        assert_eq!(collapse_whitespace(" \n "), "");
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url(&Url::parse("https://amo.house.gov/node/1").unwrap()));
        assert!(!is_web_url(&Url::parse("mailto:press@amo.house.gov").unwrap()));
        assert!(!is_web_url(&Url::parse("javascript:void(0)").unwrap()));
    }
}
