//! Turning [`RawRecord`]s into validated [`Record`]s.
//!
//! Every step either fixes the value up or drops the record with a
//! [`Dropped`] reason. A record that comes out of [`normalize`] has a
//! non-empty title, an absolute `http(s)` URL, and a date unless its rule
//! marks the date optional.

use std::fmt;

use chrono::NaiveDate;
use url::Url;

use crate::dates::parse_date;
use crate::models::{RawRecord, Record};
use crate::rules::{DomainPolicy, ExtractionRule};
use crate::utils::{collapse_whitespace, is_web_url};

/// Why a raw record did not become a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dropped {
    EmptyTitle,
    InvalidLink(String),
    /// The link points at a news index page, not a release.
    GenericUrl(String),
    MissingDate,
    UnparsableDate(String),
}

impl fmt::Display for Dropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dropped::EmptyTitle => f.write_str("empty title"),
            Dropped::InvalidLink(link) => write!(f, "invalid link `{link}`"),
            Dropped::GenericUrl(url) => write!(f, "generic index url {url}"),
            Dropped::MissingDate => f.write_str("no date"),
            Dropped::UnparsableDate(text) => write!(f, "unparsable date `{text}`"),
        }
    }
}

/// Where the raw records came from.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// The requested source URL, copied verbatim into [`Record::source`].
    pub source: String,
    pub source_url: Url,
    /// Effective URL of the fetched page. Relative links resolve against it
    /// unless the rule sets a base URL.
    pub page_url: Url,
    /// Anchor for relative date phrases. `None` disables them.
    pub reference_date: Option<NaiveDate>,
}

impl NormalizeContext {
    pub fn new(
        source: &str,
        source_url: Url,
        page_url: Url,
        reference_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            source: source.to_string(),
            source_url,
            page_url,
            reference_date,
        }
    }
}

/// Normalize one raw record.
pub fn normalize(
    raw: &RawRecord,
    rule: &ExtractionRule,
    ctx: &NormalizeContext,
) -> Result<Record, Dropped> {
    let title = collapse_whitespace(&raw.title);
    if title.is_empty() {
        return Err(Dropped::EmptyTitle);
    }

    let url = resolve_link(&raw.link, rule, ctx)?;
    if rule.generic_paths.iter().any(|p| p == url.path()) {
        return Err(Dropped::GenericUrl(url.to_string()));
    }

    let date = resolve_date(raw, rule, ctx)?;

    let domain = match rule.domain {
        DomainPolicy::Source => ctx.source_url.host_str(),
        DomainPolicy::Item => url.host_str(),
    }
    .unwrap_or_default()
    .to_string();

    let party = raw
        .party
        .as_deref()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty());

    Ok(Record {
        source: ctx.source.clone(),
        url: url.to_string(),
        title,
        date,
        domain,
        party,
    })
}

/// Make `link` absolute.
///
/// Absolute links are kept as they are. Relative ones are joined onto the
/// rule's base URL or the page URL, so `/node/4251` on
/// `https://amo.house.gov/rss.xml` becomes `https://amo.house.gov/node/4251`.
pub fn resolve_link(
    link: &str,
    rule: &ExtractionRule,
    ctx: &NormalizeContext,
) -> Result<Url, Dropped> {
    let link = link.trim();
    if link.is_empty() || link.contains(char::is_whitespace) {
        return Err(Dropped::InvalidLink(link.to_string()));
    }
    let base = match rule.base_url.as_deref().map(Url::parse) {
        Some(Ok(base)) => base,
        _ => ctx.page_url.clone(),
    };
    let url = base
        .join(link)
        .map_err(|_| Dropped::InvalidLink(link.to_string()))?;
    if !is_web_url(&url) {
        return Err(Dropped::InvalidLink(link.to_string()));
    }
    Ok(url)
}

fn resolve_date(
    raw: &RawRecord,
    rule: &ExtractionRule,
    ctx: &NormalizeContext,
) -> Result<Option<NaiveDate>, Dropped> {
    let date_rule = &rule.date;
    let from_item = raw
        .date
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let text = from_item.or_else(|| {
        let param = date_rule.source_query_param.as_deref()?;
        ctx.source_url
            .query_pairs()
            .find(|(k, _)| k.eq_ignore_ascii_case(param))
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    });

    let Some(text) = text else {
        return if date_rule.optional {
            Ok(None)
        } else {
            Err(Dropped::MissingDate)
        };
    };
    match parse_date(&text, &date_rule.formats, date_rule.well_known, ctx.reference_date) {
        Some(date) => Ok(Some(date)),
        None if date_rule.optional => Ok(None),
        None => Err(Dropped::UnparsableDate(text)),
    }
}
