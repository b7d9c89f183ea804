//! Single-source extraction: fetch, parse, apply the rule, normalize.
//!
//! [`Pipeline::run_source`] is the only step that touches the network.
//! Everything after the fetch lives in [`extract_records`], a pure function
//! of the fetched bytes, the rule and the reference date.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tracing::{debug, instrument};
use url::Url;

use crate::document::parse_with_charset;
use crate::error::PipelineError;
use crate::extract;
use crate::fetch::{validate_url, Fetcher};
use crate::models::{FetchResult, Record, Stage};
use crate::normalize::{normalize, NormalizeContext};
use crate::rules::ExtractionRule;
use crate::utils::truncate_for_log;

static FEED_RULE: Lazy<Arc<ExtractionRule>> = Lazy::new(|| Arc::new(ExtractionRule::feed()));

/// One URL to extract from and the rule to read it with.
#[derive(Debug, Clone)]
pub struct Source {
    pub url: String,
    pub rule: Arc<ExtractionRule>,
    /// Registry name, when the source came from one.
    pub name: Option<String>,
}

impl Source {
    /// An RSS or Atom feed read with [`ExtractionRule::feed`].
    pub fn feed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rule: Arc::clone(&FEED_RULE),
            name: None,
        }
    }

    /// A page read with a site-specific rule.
    pub fn scraped(url: impl Into<String>, rule: Arc<ExtractionRule>) -> Self {
        Self {
            url: url.into(),
            rule,
            name: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// Knobs shared by every source in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Per-fetch timeout.
    pub timeout: Duration,
    /// Date that "today" and "3 days ago" are resolved against. Relative
    /// phrases are not parsed when this is `None`.
    pub reference_date: Option<NaiveDate>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            reference_date: None,
        }
    }
}

/// Composes a [`Fetcher`] with parsing, extraction and normalization.
#[derive(Debug, Clone)]
pub struct Pipeline<F> {
    fetcher: F,
    options: PipelineOptions,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(fetcher: F, options: PipelineOptions) -> Self {
        Self { fetcher, options }
    }

    /// Run one source end to end.
    ///
    /// # Errors
    ///
    /// Whatever stopped the source: a [`crate::error::RuleError`] for a rule
    /// that does not validate (checked before anything is fetched), a
    /// [`crate::error::FetchError`], [`crate::error::ParseError`] or
    /// [`crate::error::RuleMismatchError`]. Dropped items are not errors.
    #[instrument(
        level = "info",
        skip_all,
        fields(url = %source.url, name = source.name.as_deref())
    )]
    pub async fn run_source(&self, source: &Source) -> Result<Vec<Record>, PipelineError> {
        debug!(stage = %Stage::Pending, "Source stage");
        let result = self.fetch_and_extract(source).await;
        if let Err(error) = &result {
            debug!(stage = %Stage::Failed, failed_in = %error.stage(), "Source stage");
        }
        result
    }

    async fn fetch_and_extract(&self, source: &Source) -> Result<Vec<Record>, PipelineError> {
        source.rule.validate()?;
        debug!(stage = %Stage::Fetching, "Source stage");
        let fetched = self.fetcher.fetch(&source.url, self.options.timeout).await?;
        extract_records(&source.url, &fetched, &source.rule, self.options.reference_date)
    }
}

/// Everything after the fetch, for one source.
///
/// `source` is the URL that was requested. Records carry it verbatim and
/// take their domain from it; relative links resolve against the effective
/// URL in `fetched`.
pub fn extract_records(
    source: &str,
    fetched: &FetchResult,
    rule: &ExtractionRule,
    reference_date: Option<NaiveDate>,
) -> Result<Vec<Record>, PipelineError> {
    let source_url = validate_url(source)?;
    let page_url = Url::parse(&fetched.url).unwrap_or_else(|_| source_url.clone());

    debug!(stage = %Stage::Parsing, bytes = fetched.content.len(), "Source stage");
    let document = parse_with_charset(&fetched.content, fetched.charset.as_deref(), rule.mode)?;

    debug!(stage = %Stage::Extracting, "Source stage");
    let raws = extract::apply(rule, &document)?;

    debug!(stage = %Stage::Normalizing, items = raws.len(), "Source stage");
    let ctx = NormalizeContext::new(source, source_url, page_url, reference_date);
    let mut records = Vec::with_capacity(raws.len());
    for raw in &raws {
        match normalize(raw, rule, &ctx) {
            Ok(record) => records.push(record),
            Err(reason) => debug!(
                %reason,
                title = %truncate_for_log(raw.title.trim(), 80),
                link = %truncate_for_log(raw.link.trim(), 120),
                "Dropped item"
            ),
        }
    }
    debug!(stage = %Stage::Succeeded, records = records.len(), "Source stage");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchCause, FetchError};
    use crate::rules::{DateRule, Locator, LocatorStrategy};

    const RUIZ_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Dr. Raul Ruiz</title>
<item><title>Dr. Ruiz Secures Funding for Coachella Valley</title><link>https://ruiz.house.gov/media/press-releases/funding</link><pubDate>Fri, 10 Jan 2025 12:00:00 -0800</pubDate></item>
<item><title>Dr. Ruiz Statement</title><link>/media/press-releases/statement</link><pubDate>Thu, 09 Jan 2025 09:30:00 -0800</pubDate></item>
<item><title>Dr. Ruiz Votes</title><link>/media/press-releases/votes</link><pubDate>Wed, 08 Jan 2025 17:15:00 -0800</pubDate></item>
</channel></rss>"#;

    struct CannedFetcher(&'static str);

    impl Fetcher for CannedFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResult, FetchError> {
            if self.0.is_empty() {
                return Err(FetchError::new(url, FetchCause::Status(404)));
            }
            Ok(FetchResult::new(url, self.0.as_bytes()))
        }
    }

    #[test]
    fn test_feed_items_become_records() {
        let fetched = FetchResult::new("https://ruiz.house.gov/rss.xml", RUIZ_FEED);
        let records = extract_records(
            "https://ruiz.house.gov/rss.xml",
            &fetched,
            &ExtractionRule::feed(),
            None,
        )
        .unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.domain, "ruiz.house.gov");
            assert_eq!(record.source, "https://ruiz.house.gov/rss.xml");
            assert!(record.url.starts_with("https://ruiz.house.gov/media/press-releases/"));
            assert!(record.date.is_some());
        }
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2025, 1, 9));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let fetched = FetchResult::new("https://ruiz.house.gov/rss.xml", RUIZ_FEED);
        let rule = ExtractionRule::feed();
        let first = extract_records(
            "https://ruiz.house.gov/rss.xml",
            &fetched,
            &rule,
            None,
        )
        .unwrap();
        let second = extract_records(
            "https://ruiz.house.gov/rss.xml",
            &fetched,
            &rule,
            None,
        )
        .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_links_resolve_against_redirected_page() {
        let fetched = FetchResult::new("https://ruiz.house.gov/feeds/press.xml", RUIZ_FEED);
        let records = extract_records(
            "http://ruiz.house.gov/rss.xml",
            &fetched,
            &ExtractionRule::feed(),
            None,
        )
        .unwrap();
        assert_eq!(records[1].url, "https://ruiz.house.gov/media/press-releases/statement");
        assert_eq!(records[1].source, "http://ruiz.house.gov/rss.xml");
    }

    #[test]
    fn test_legacy_charset_titles_are_decoded() {
        let body = b"<rss><channel><item><title>\x93Caf\xe9\x94 Statement</title><link>/media/1</link></item></channel></rss>";
        let fetched = FetchResult::new("https://ruiz.house.gov/rss.xml", &body[..])
            .with_charset(Some("windows-1252".to_string()));
        let records = extract_records(
            "https://ruiz.house.gov/rss.xml",
            &fetched,
            &ExtractionRule::feed(),
            None,
        )
        .unwrap();
        assert_eq!(records[0].title, "\u{201c}Caf\u{e9}\u{201d} Statement");
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        let fetched = FetchResult::new("https://x.house.gov/rss.xml", "<rss><channel>");
        let err = extract_records(
            "https://x.house.gov/rss.xml",
            &fetched,
            &ExtractionRule::feed(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.stage(), Stage::Parsing);
    }

    #[test]
    fn test_empty_feed_is_rule_mismatch() {
        let fetched = FetchResult::new(
            "https://x.house.gov/rss.xml",
            "<rss><channel><title>t</title></channel></rss>",
        );
        let err = extract_records(
            "https://x.house.gov/rss.xml",
            &fetched,
            &ExtractionRule::feed(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "rule_mismatch");
    }

    #[tokio::test]
    async fn test_run_source_propagates_fetch_errors() {
        let pipeline = Pipeline::new(CannedFetcher(""), PipelineOptions::default());
        let err = pipeline
            .run_source(&Source::feed("https://gone.house.gov/rss.xml"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Fetching);
    }

    #[tokio::test]
    async fn test_invalid_rule_fails_before_fetching() {
        let mut rule = ExtractionRule::feed();
        rule.date = DateRule::new(Locator::text(LocatorStrategy::tag("pubDate")), &["%Q"]).strict();
        let pipeline = Pipeline::new(CannedFetcher(""), PipelineOptions::default());
        let err = pipeline
            .run_source(&Source::scraped("https://ruiz.house.gov/rss.xml", Arc::new(rule)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rule");
        assert_eq!(err.stage(), Stage::Extracting);
    }

    #[tokio::test]
    async fn test_run_source() {
        let pipeline = Pipeline::new(CannedFetcher(RUIZ_FEED), PipelineOptions::default());
        let source = Source::feed("https://ruiz.house.gov/rss.xml").named("ruiz");
        let records = pipeline.run_source(&source).await.unwrap();
        assert_eq!(records.len(), 3);
    }
}
