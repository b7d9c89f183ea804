//! Error taxonomy for the extraction pipeline.
//!
//! Errors are split by the stage that produced them. [`FetchError`] and
//! [`ParseError`] are per-source failures that a batch records and moves past,
//! [`RuleMismatchError`] means a page no longer has the layout its rule expects,
//! and [`RuleError`] is raised when a malformed rule is registered.
//!
//! Missing fields on a single item are not errors at all. Those items are
//! dropped inside [`crate::extract`] and [`crate::normalize`].

use std::time::Duration;
use thiserror::Error;

use crate::models::Stage;

/// A failed HTTP retrieval. Carries the URL that was requested.
#[derive(Error, Debug)]
#[error("fetching {url} failed: {cause}")]
pub struct FetchError {
    /// The URL that was requested.
    pub url: String,
    /// What went wrong.
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }
}

/// Underlying reason for a [`FetchError`].
#[derive(Error, Debug)]
pub enum FetchCause {
    /// The URL is not an absolute `http`/`https` URL with a host.
    #[error("not an absolute http(s) url: {0}")]
    InvalidUrl(String),
    /// No complete response arrived within the per-request timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The server answered with a status outside `2xx`.
    #[error("expected a 2xx response but got HTTP {0}")]
    Status(u16),
    /// Connection, TLS, redirect or body read failure.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

/// The fetched content could not be turned into a document at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,
    #[error("malformed xml at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("xml document has no root element")]
    NoRoot,
}

/// The rule's item-list locator matched nothing on the page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("item locator `{locator}` matched no elements")]
pub struct RuleMismatchError {
    /// Human readable form of the item locator.
    pub locator: String,
}

/// A malformed extraction rule, rejected when it is registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid rule field `{field}`: {reason}")]
pub struct RuleError {
    pub field: String,
    pub reason: String,
}

impl RuleError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Everything that can stop a single source from producing records.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    RuleMismatch(#[from] RuleMismatchError),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl PipelineError {
    /// The pipeline stage this error terminated.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Fetch(_) => Stage::Fetching,
            PipelineError::Parse(_) => Stage::Parsing,
            PipelineError::RuleMismatch(_) | PipelineError::Rule(_) => Stage::Extracting,
        }
    }

    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Parse(_) => "parse",
            PipelineError::RuleMismatch(_) => "rule_mismatch",
            PipelineError::Rule(_) => "rule",
        }
    }
}

/// Registry lookups and registrations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no registered source named `{0}`")]
    UnknownSource(String),
    #[error("source `{0}` is already registered")]
    Duplicate(String),
    #[error("source `{name}` has no urls")]
    NoUrls { name: String },
    #[error("source `{name}` has an invalid url template `{template}`")]
    InvalidUrl { name: String, template: String },
    #[error("source `{name}`: {error}")]
    InvalidRule {
        name: String,
        #[source]
        error: RuleError,
    },
    #[error("could not read rule table: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("could not read rule table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Loading [`crate::config::Settings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid setting `{0}`")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_url() {
        let e = FetchError::new("https://amo.house.gov/rss.xml", FetchCause::Status(503));
        let msg = e.to_string();
        assert!(msg.contains("https://amo.house.gov/rss.xml"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_pipeline_error_stage() {
        let timeout = FetchCause::Timeout(Duration::from_secs(1));
        let fetch: PipelineError = FetchError::new("https://x.house.gov", timeout).into();
        assert_eq!(fetch.stage(), Stage::Fetching);
        assert_eq!(fetch.kind(), "fetch");

        let parse: PipelineError = ParseError::Empty.into();
        assert_eq!(parse.stage(), Stage::Parsing);

        let mismatch: PipelineError = RuleMismatchError {
            locator: "tr".to_string(),
        }
        .into();
        assert_eq!(mismatch.stage(), Stage::Extracting);
        assert_eq!(mismatch.kind(), "rule_mismatch");
    }
}
