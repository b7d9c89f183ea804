//! # Capitol Statements
//!
//! Collects press-release metadata (title, URL, date, domain) from U.S.
//! Congress members' RSS feeds and, where no usable feed exists, from their
//! websites using declarative per-site extraction rules.
//!
//! ## Pipeline
//!
//! Every source goes through the same steps:
//! 1. **Fetch**: one HTTP GET with a timeout ([`fetch`])
//! 2. **Parse**: XML or HTML into a queryable document ([`document`])
//! 3. **Extract**: the rule's locators pull raw fields out of each item ([`extract`])
//! 4. **Normalize**: trim, resolve links, parse dates, derive the domain ([`normalize`])
//!
//! [`batch::BatchRunner`] runs many sources concurrently. A failing source
//! is reported in [`models::BatchOutcome::failures`] and never stops the
//! others.
//!
//! ## Example
//!
//! ```no_run
//! use capitol_statements::batch::BatchRunner;
//! use capitol_statements::fetch::{HttpFetcher, DEFAULT_USER_AGENT};
//! use capitol_statements::pipeline::{Pipeline, PipelineOptions, Source};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT)?;
//! let runner = BatchRunner::new(Pipeline::new(fetcher, PipelineOptions::default()), 8);
//! let outcome = runner
//!     .run(&[Source::feed("https://hageman.house.gov/rss.xml")])
//!     .await;
//! for record in &outcome.records {
//!     println!("{} {}", record.domain, record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod dates;
pub mod document;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod registry;
pub mod rules;
pub mod utils;

pub use batch::BatchRunner;
pub use error::PipelineError;
pub use fetch::{Fetcher, HttpFetcher};
pub use models::{BatchOutcome, Failure, Record};
pub use pipeline::{Pipeline, PipelineOptions, Source};
pub use registry::Registry;
pub use rules::ExtractionRule;
