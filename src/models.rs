//! Data models shared by every stage of the pipeline.
//!
//! - [`FetchResult`]: raw bytes of one fetched page, consumed within one run
//! - [`RawRecord`]: field values pulled out of one item container, unvalidated
//! - [`Record`]: a normalized press release, the only thing callers see
//! - [`BatchOutcome`]: records plus per-source [`Failure`]s from a batch

use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::PipelineError;

/// Raw content of a fetched page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Effective URL after redirects.
    pub url: String,
    /// Response body.
    pub content: Vec<u8>,
    /// `charset` parameter of the response `Content-Type`, if any.
    pub charset: Option<String>,
}

impl FetchResult {
    pub fn new(url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            charset: None,
        }
    }

    pub fn with_charset(mut self, charset: Option<String>) -> Self {
        self.charset = charset;
        self
    }
}

/// Field values located inside one item container.
///
/// Title and link were found; date and party may not have been.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub title: String,
    pub link: String,
    pub date: Option<String>,
    pub party: Option<String>,
}

/// A normalized press release.
///
/// `url` is absolute and `title` is non-empty. `date` is `None` only when the
/// rule that produced the record marks its date optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The page or feed URL the record was extracted from, verbatim.
    pub source: String,
    /// Absolute press-release URL.
    pub url: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    /// Hostname the record is attributed to.
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
}

/// Per-source pipeline stage.
///
/// A source moves `Pending → Fetching → Parsing → Extracting → Normalizing`
/// and ends in `Succeeded` or `Failed`. There is no transition out of `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Fetching,
    Parsing,
    Extracting,
    Normalizing,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Extracting => "extracting",
            Stage::Normalizing => "normalizing",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One source that produced no records because of an error.
#[derive(Debug)]
pub struct Failure {
    pub source: String,
    pub error: PipelineError,
}

impl Failure {
    pub fn new(source: impl Into<String>, error: PipelineError) -> Self {
        Self {
            source: source.into(),
            error,
        }
    }

    /// Stage at which the source failed.
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Failure", 4)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("stage", &self.stage())?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// Result of running a list of sources.
///
/// Records keep the relative order of their sources, as do failures.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub records: Vec<Record>,
    pub failures: Vec<Failure>,
    /// Number of sources that finished without error, even with zero records.
    pub succeeded: usize,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
