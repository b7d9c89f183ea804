//! Running many sources with per-source failure isolation.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::fetch::Fetcher;
use crate::models::{BatchOutcome, Failure};
use crate::pipeline::{Pipeline, Source};

/// Default number of sources in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runs a [`Pipeline`] over a list of sources.
///
/// Up to `concurrency` sources are fetched at once. Results are collected
/// in input order, so the outcome does not depend on which server answers
/// first.
#[derive(Debug, Clone)]
pub struct BatchRunner<F> {
    pipeline: Pipeline<F>,
    concurrency: usize,
}

impl<F: Fetcher> BatchRunner<F> {
    pub fn new(pipeline: Pipeline<F>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Run every source and gather records and failures.
    ///
    /// Never fails as a whole: a source that errors contributes one
    /// [`Failure`] and no records.
    #[instrument(
        level = "info",
        skip_all,
        fields(sources = sources.len(), concurrency = self.concurrency)
    )]
    pub async fn run(&self, sources: &[Source]) -> BatchOutcome {
        let results: Vec<_> = stream::iter(sources)
            .map(|source| async move { (source, self.pipeline.run_source(source).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (source, result) in results {
            match result {
                Ok(records) => {
                    debug!(url = %source.url, count = records.len(), "Source succeeded");
                    outcome.succeeded += 1;
                    outcome.records.extend(records);
                }
                Err(error) => {
                    warn!(
                        url = %source.url,
                        stage = %error.stage(),
                        kind = error.kind(),
                        error = %error,
                        "Source failed"
                    );
                    outcome.failures.push(Failure::new(source.url.clone(), error));
                }
            }
        }

        info!(
            records = outcome.records.len(),
            succeeded = outcome.succeeded,
            failed = outcome.failures.len(),
            "Batch complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use crate::error::{FetchCause, FetchError};
    use crate::models::FetchResult;
    use crate::pipeline::PipelineOptions;
    use crate::rules::{DateRule, ExtractionRule, Locator, LocatorStrategy};

    fn feed(domain: &str, titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "<item><title>{t}</title><link>https://{domain}/media/{i}</link><pubDate>Mon, 06 Jan 2025 10:00:00 -0500</pubDate></item>"
                )
            })
            .collect();
        format!("<rss><channel>{items}</channel></rss>")
    }

    /// Serves canned bodies; responds slower for URLs listed in `delays`.
    struct FakeFetcher {
        pages: HashMap<String, String>,
        delays: HashMap<String, u64>,
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResult, FetchError> {
            if let Some(ms) = self.delays.get(url) {
                sleep(Duration::from_millis(*ms)).await;
            }
            match self.pages.get(url) {
                Some(body) => Ok(FetchResult::new(url, body.as_bytes())),
                None => Err(FetchError::new(url, FetchCause::Status(503))),
            }
        }
    }

    fn runner(fetcher: FakeFetcher, concurrency: usize) -> BatchRunner<FakeFetcher> {
        BatchRunner::new(Pipeline::new(fetcher, PipelineOptions::default()), concurrency)
    }

    #[tokio::test]
    async fn test_failed_source_is_isolated() {
        let fetcher = FakeFetcher {
            pages: HashMap::from([
                ("https://a.house.gov/rss.xml".to_string(), feed("a.house.gov", &["A1", "A2"])),
                ("https://c.house.gov/rss.xml".to_string(), feed("c.house.gov", &["C1"])),
            ]),
            delays: HashMap::new(),
        };
        let sources = vec![
            Source::feed("https://a.house.gov/rss.xml"),
            Source::feed("https://b.house.gov/rss.xml"),
            Source::feed("https://c.house.gov/rss.xml"),
        ];
        let outcome = runner(fetcher, 2).run(&sources).await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].source, "https://b.house.gov/rss.xml");
        assert_eq!(outcome.failures[0].kind(), "fetch");
        assert!(!outcome.is_clean());
    }

    #[tokio::test]
    async fn test_output_order_follows_input_order() {
        let fetcher = FakeFetcher {
            pages: HashMap::from([
                ("https://slow.house.gov/rss.xml".to_string(), feed("slow.house.gov", &["Slow"])),
                ("https://fast.house.gov/rss.xml".to_string(), feed("fast.house.gov", &["Fast"])),
            ]),
            delays: HashMap::from([("https://slow.house.gov/rss.xml".to_string(), 50)]),
        };
        let sources = vec![
            Source::feed("https://slow.house.gov/rss.xml"),
            Source::feed("https://fast.house.gov/rss.xml"),
        ];
        let outcome = runner(fetcher, 4).run(&sources).await;
        let titles: Vec<_> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Slow", "Fast"]);
    }

    /// Counts fetches in flight and remembers the peak.
    #[derive(Default)]
    struct GaugedFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Fetcher for GaugedFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResult, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(FetchResult::new(url, feed("g.house.gov", &["G"])))
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let fetcher = GaugedFetcher::default();
        let sources: Vec<_> = (0..6)
            .map(|i| Source::feed(format!("https://g{i}.house.gov/rss.xml")))
            .collect();
        let runner = BatchRunner::new(Pipeline::new(&fetcher, PipelineOptions::default()), 2);
        let outcome = runner.run(&sources).await;

        assert_eq!(outcome.succeeded, 6);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_rule_is_a_failure() {
        let mut rule = ExtractionRule::feed();
        rule.date = DateRule::new(Locator::text(LocatorStrategy::tag("pubDate")), &["%Q"]).strict();
        let url = "https://a.house.gov/rss.xml";
        let fetcher = FakeFetcher {
            pages: HashMap::from([(url.to_string(), feed("a.house.gov", &["A1"]))]),
            delays: HashMap::new(),
        };
        let outcome = runner(fetcher, 2)
            .run(&[Source::scraped(url, Arc::new(rule)), Source::feed(url)])
            .await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind(), "rule");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fetcher = FakeFetcher {
            pages: HashMap::new(),
            delays: HashMap::new(),
        };
        let outcome = runner(fetcher, 0).run(&[]).await;
        assert!(outcome.records.is_empty());
        assert!(outcome.is_clean());
        assert_eq!(outcome.succeeded, 0);
    }
}
