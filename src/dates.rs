//! Date parsing for press-release listings.
//!
//! Congressional sites share no date convention: "January 5, 2025",
//! "01.05.25", "2025-01-05T10:00:00Z", "Posted on Jan 5th, 2025" and
//! "3 days ago" all occur. Text is cleaned up once, then tried against the
//! rule's formats in order and, unless the rule opts out, against
//! [`WELL_KNOWN_FORMATS`]. The first format that matches wins.
//!
//! Relative phrases need a reference date. It is passed in explicitly so the
//! same input always parses to the same date.

use chrono::{DateTime, Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Formats tried after a rule's own, in this order.
pub const WELL_KNOWN_FORMATS: &[&str] = &[
    "rfc2822",
    "rfc3339",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m.%d.%Y",
    "%m.%d.%y",
    "%Y-%m-%d",
    "%d %B %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%a, %d %b %Y",
];

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(posted|published|released|updated|date)(\s+on)?\s*:?\s+").unwrap()
});

static RE_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());

static RE_SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").unwrap());

static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+|an?|one)\s+(minute|min|hour|hr|day|week)s?\s+ago$").unwrap()
});

/// Normalize date text before matching formats.
///
/// Collapses whitespace, drops a leading "Posted on"-style label, removes
/// ordinal suffixes and shortens "Sept" to "Sep".
pub fn clean_date_text(text: &str) -> String {
    let collapsed = crate::utils::collapse_whitespace(text);
    let unlabeled = RE_LABEL.replace(&collapsed, "");
    let no_ordinals = RE_ORDINAL.replace_all(&unlabeled, "$1");
    RE_SEPT.replace_all(&no_ordinals, "Sep").into_owned()
}

/// Parse already-cleaned text with one format.
///
/// `rfc2822` and `rfc3339` keep the calendar date in the offset the text was
/// written in. strftime formats may match a prefix of the text when what
/// follows is a time of day or other separator-led suffix.
pub fn parse_with_format(text: &str, format: &str) -> Option<NaiveDate> {
    match format {
        "rfc2822" => DateTime::parse_from_rfc2822(text).ok().map(|d| d.date_naive()),
        "rfc3339" => DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()),
        _ => {
            let (date, rest) = NaiveDate::parse_and_remainder(text, format).ok()?;
            // `%Y` happily reads "25" as the year 25.
            let plausible = (1900..=2200).contains(&date.year());
            (plausible && acceptable_remainder(rest)).then_some(date)
        }
    }
}

fn acceptable_remainder(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some('T') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(c) => !c.is_alphanumeric(),
    }
}

/// Resolve "today", "yesterday" and "N days ago" style phrases.
pub fn parse_relative(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let lower = text.trim().to_lowercase();
    match lower.as_str() {
        "today" | "just now" => return Some(reference),
        "yesterday" => return reference.pred_opt(),
        _ => {}
    }
    let caps = RE_RELATIVE.captures(&lower)?;
    let n: i64 = match &caps[1] {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };
    let days = match &caps[2] {
        "minute" | "min" | "hour" | "hr" => 0,
        "day" => n,
        "week" => n.checked_mul(7)?,
        _ => return None,
    };
    reference.checked_sub_signed(Duration::try_days(days)?)
}

/// Run the full cascade over `text`.
///
/// Tries `formats` in order, then [`WELL_KNOWN_FORMATS`] when `well_known`
/// is set, then relative phrases when a `reference` date is supplied.
pub fn parse_date(
    text: &str,
    formats: &[String],
    well_known: bool,
    reference: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let cleaned = clean_date_text(text);
    if cleaned.is_empty() {
        return None;
    }
    let extra: &[&str] = if well_known { WELL_KNOWN_FORMATS } else { &[] };
    formats
        .iter()
        .map(String::as_str)
        .chain(extra.iter().copied())
        .find_map(|format| parse_with_format(&cleaned, format))
        .or_else(|| reference.and_then(|r| parse_relative(&cleaned, r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn formats(f: &[&str]) -> Vec<String> {
        f.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hint_format() {
        assert_eq!(
            parse_date("March 3, 2024", &formats(&["%B %d, %Y"]), false, None),
            Some(ymd(2024, 3, 3))
        );
    }

    #[test]
    fn test_unparseable_text() {
        assert_eq!(parse_date("TBD", &formats(&["%B %d, %Y"]), true, None), None);
        assert_eq!(parse_date("   ", &[], true, None), None);
    }

    #[test]
    fn test_fallback_order() {
        // "%m.%d.%y" must not grab the first two digits of a four-digit year.
        assert_eq!(
            parse_date("01.05.2025", &formats(&["%m.%d.%y", "%m.%d.%Y"]), false, None),
            Some(ymd(2025, 1, 5))
        );
        assert_eq!(
            parse_date("04.15.23", &formats(&["%m.%d.%y", "%B %d, %Y"]), false, None),
            Some(ymd(2023, 4, 15))
        );
    }

    #[test]
    fn test_two_digit_year_not_read_as_four() {
        assert_eq!(parse_date("01/05/25", &[], true, None), Some(ymd(2025, 1, 5)));
        assert_eq!(parse_with_format("01/05/25", "%m/%d/%Y"), None);
    }

    #[test]
    fn test_strict_rule_ignores_well_known() {
        assert_eq!(parse_date("2025-01-05", &formats(&["%B %d, %Y"]), false, None), None);
        assert_eq!(
            parse_date("2025-01-05", &formats(&["%B %d, %Y"]), true, None),
            Some(ymd(2025, 1, 5))
        );
    }

    #[test]
    fn test_rss_dates() {
        assert_eq!(
            parse_date("Mon, 06 Jan 2025 15:00:00 -0500", &[], true, None),
            Some(ymd(2025, 1, 6))
        );
        assert_eq!(
            parse_date("Mon, 06 Jan 2025 23:30:00 EST", &[], true, None),
            Some(ymd(2025, 1, 6))
        );
        assert_eq!(
            parse_date("2025-01-07T08:00:00Z", &[], true, None),
            Some(ymd(2025, 1, 7))
        );
    }

    #[test]
    fn test_trailing_time_is_accepted() {
        assert_eq!(
            parse_date("January 5, 2025 10:30 AM", &formats(&["%B %d, %Y"]), false, None),
            Some(ymd(2025, 1, 5))
        );
        assert_eq!(parse_with_format("2025-01-05T10:00", "%Y-%m-%d"), Some(ymd(2025, 1, 5)));
        assert_eq!(parse_with_format("2025-01-05Tuesday", "%Y-%m-%d"), None);
    }

    #[test]
    fn test_cleanup() {
        assert_eq!(clean_date_text("  Posted on\n Jan 5th,  2025 "), "Jan 5, 2025");
        assert_eq!(clean_date_text("Published: Sept. 3, 2024"), "Sep. 3, 2024");
        assert_eq!(
            parse_date("Posted on Sept 21st, 2024", &[], true, None),
            Some(ymd(2024, 9, 21))
        );
    }

    #[test]
    fn test_relative_phrases_need_reference() {
        let today = ymd(2025, 3, 10);
        assert_eq!(parse_date("yesterday", &[], true, None), None);
        assert_eq!(parse_date("Yesterday", &[], true, Some(today)), Some(ymd(2025, 3, 9)));
        assert_eq!(parse_date("today", &[], true, Some(today)), Some(today));
        assert_eq!(parse_date("3 days ago", &[], true, Some(today)), Some(ymd(2025, 3, 7)));
        assert_eq!(parse_date("2 weeks ago", &[], true, Some(today)), Some(ymd(2025, 2, 24)));
        assert_eq!(parse_date("5 hours ago", &[], true, Some(today)), Some(today));
        assert_eq!(parse_date("a day ago", &[], true, Some(today)), Some(ymd(2025, 3, 9)));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let f = formats(&["%m/%d/%y"]);
        let a = parse_date("01/05/25", &f, true, None);
        let b = parse_date("01/05/25", &f, true, None);
        assert_eq!(a, b);
        assert_eq!(a, Some(ymd(2025, 1, 5)));
    }
}
