//! End-to-end batch runs against an in-memory fetcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use capitol_statements::error::{FetchCause, FetchError};
use capitol_statements::models::{FetchResult, Stage};
use capitol_statements::registry::Registry;
use capitol_statements::rules::{DateRule, ExtractionRule, Locator, LocatorStrategy};
use capitol_statements::{BatchRunner, Fetcher, Pipeline, PipelineOptions, Source};

#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, String>,
}

impl FakeWeb {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

impl Fetcher for FakeWeb {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResult, FetchError> {
        match self.pages.get(url) {
            Some(body) => Ok(FetchResult::new(url, body.as_bytes())),
            None if url.contains("slow") => Err(FetchError::new(url, FetchCause::Timeout(timeout))),
            None => Err(FetchError::new(url, FetchCause::Status(404))),
        }
    }
}

fn runner(web: FakeWeb) -> BatchRunner<FakeWeb> {
    let options = PipelineOptions {
        timeout: Duration::from_secs(5),
        reference_date: None,
    };
    BatchRunner::new(Pipeline::new(web, options), 4)
}

fn rss(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!("<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
        })
        .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Press</title>{body}</channel></rss>"#)
}

const RECORDLIST_PAGE: &str = r#"<!DOCTYPE html>
<html><body><main>
<table class="table recordList">
  <thead><tr><th>Date</th><th>Type</th><th>Title</th></tr></thead>
  <tbody>
    <tr><td>01/06/25</td><td>Press Release</td><td><a href="/news/documentsingle.aspx?DocumentID=401">Emmer Statement on House Rules</a></td></tr>
    <tr><td>01/03/25</td><td>Press Release</td><td>Swearing-in ceremony (no release)</td></tr>
    <tr><td>01/02/25</td><td>Press Release</td><td><a href="/news/documentsingle.aspx?DocumentID=399">Emmer Sworn In</a></td></tr>
  </tbody>
</table>
</main></body></html>"#;

fn recordlist_rule() -> Arc<ExtractionRule> {
    Arc::new(ExtractionRule::html(
        LocatorStrategy::descendant(vec![
            LocatorStrategy::tag_class("table", "recordList"),
            LocatorStrategy::tag("tr"),
        ]),
        Locator::text(LocatorStrategy::nth(LocatorStrategy::tag("td"), 2)),
        Locator::link(LocatorStrategy::css("td a")),
        DateRule::new(
            Locator::text(LocatorStrategy::nth(LocatorStrategy::tag("td"), 0)),
            &["%m/%d/%y"],
        ),
    ))
}

#[tokio::test]
async fn rss_items_all_become_records() {
    let feed = rss(&[
        (
            "Hageman Bill Passes",
            "https://hageman.house.gov/media/press-releases/bill",
            "Tue, 07 Jan 2025 10:00:00 -0700",
        ),
        ("Hageman Statement", "/media/press-releases/statement", "Mon, 06 Jan 2025 10:00:00 -0700"),
        ("Hageman Letter", "/media/press-releases/letter", "Fri, 03 Jan 2025 10:00:00 -0700"),
        ("Hageman Sworn In", "/media/press-releases/sworn-in", "Fri, 03 Jan 2025 08:00:00 -0700"),
    ]);
    let web = FakeWeb::default().page("https://hageman.house.gov/rss.xml", &feed);
    let outcome = runner(web)
        .run(&[Source::feed("https://hageman.house.gov/rss.xml")])
        .await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.records.len(), 4);
    for record in &outcome.records {
        assert_eq!(record.domain, "hageman.house.gov");
        assert_eq!(record.source, "https://hageman.house.gov/rss.xml");
        assert!(!record.title.is_empty());
        assert!(record.url.starts_with("https://hageman.house.gov/"));
        assert!(record.date.is_some());
    }
    assert_eq!(outcome.records[1].url, "https://hageman.house.gov/media/press-releases/statement");
}

#[tokio::test]
async fn failures_are_isolated_and_ordered() {
    let amo = rss(&[("Amo Statement", "/node/4251", "Mon, 06 Jan 2025 09:00:00 -0500")]);
    let ruiz = rss(&[("Dr. Ruiz Statement", "/media/1", "Mon, 06 Jan 2025 09:00:00 -0800")]);
    let web = FakeWeb::default()
        .page("https://amo.house.gov/rss.xml", &amo)
        .page("https://ruiz.house.gov/rss.xml", &ruiz)
        .page("https://broken.house.gov/rss.xml", "<rss><channel><item>");

    let sources = vec![
        Source::feed("https://missing.house.gov/rss.xml"),
        Source::feed("https://amo.house.gov/rss.xml"),
        Source::feed("https://broken.house.gov/rss.xml"),
        Source::feed("https://slow.house.gov/rss.xml"),
        Source::feed("https://ruiz.house.gov/rss.xml"),
    ];
    let outcome = runner(web).run(&sources).await;

    let urls: Vec<_> = outcome.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://amo.house.gov/node/4251", "https://ruiz.house.gov/media/1"]);
    assert_eq!(outcome.succeeded, 2);

    let failed: Vec<_> = outcome
        .failures
        .iter()
        .map(|f| (f.source.as_str(), f.stage()))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("https://missing.house.gov/rss.xml", Stage::Fetching),
            ("https://broken.house.gov/rss.xml", Stage::Parsing),
            ("https://slow.house.gov/rss.xml", Stage::Fetching),
        ]
    );
}

#[tokio::test]
async fn recordlist_page_drops_incomplete_row() {
    let url = "https://emmer.house.gov/press-releases?page=1";
    let web = FakeWeb::default().page(url, RECORDLIST_PAGE);
    let outcome = runner(web)
        .run(&[Source::scraped(url, recordlist_rule())])
        .await;

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].title, "Emmer Statement on House Rules");
    assert_eq!(
        outcome.records[0].url,
        "https://emmer.house.gov/news/documentsingle.aspx?DocumentID=401"
    );
    assert_eq!(outcome.records[0].date, NaiveDate::from_ymd_opt(2025, 1, 6));
    assert_eq!(outcome.records[1].date, NaiveDate::from_ymd_opt(2025, 1, 2));
}

#[tokio::test]
async fn layout_change_is_reported_as_rule_mismatch() {
    let url = "https://emmer.house.gov/press-releases?page=1";
    let web = FakeWeb::default().page(url, "<html><body><div class='cards'></div></body></html>");
    let outcome = runner(web)
        .run(&[Source::scraped(url, recordlist_rule())])
        .await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind(), "rule_mismatch");
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["failures"][0]["stage"], "extracting");
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let feed = rss(&[("Amo Statement", "/node/4251", "Mon, 06 Jan 2025 09:00:00 -0500")]);
    let web = FakeWeb::default().page("https://amo.house.gov/rss.xml", &feed);
    let runner = runner(web);
    let sources = [Source::feed("https://amo.house.gov/rss.xml")];

    let first = serde_json::to_string(&runner.run(&sources).await).unwrap();
    let second = serde_json::to_string(&runner.run(&sources).await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn registry_sources_run_through_the_batch() {
    let registry = Registry::builtin().unwrap();
    let sources = registry.sources("recordlist", Some(1)).unwrap();
    let web =
        FakeWeb::default().page("https://emmer.house.gov/press-releases?page=1", RECORDLIST_PAGE);
    let outcome = runner(web).run(&sources).await;

    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.records.iter().all(|r| r.domain == "emmer.house.gov"));
    // fitzpatrick is not served by the fake
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].source, "https://fitzpatrick.house.gov/press-releases?page=1");
}
