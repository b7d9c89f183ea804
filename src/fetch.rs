//! HTTP retrieval of feeds and press pages.
//!
//! [`Fetcher`] is the seam between the pipeline and the network. The pipeline
//! only ever asks for one URL with one timeout and gets back bytes or a
//! [`FetchError`]. [`HttpFetcher`] is the `reqwest` implementation; tests
//! substitute an in-memory fake.
//!
//! A fetch is a single attempt. Retrying is left to whoever calls the batch.

use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{FetchCause, FetchError};
use crate::models::FetchResult;
use crate::utils::is_web_url;

/// User agent sent by default. Several Senate sites reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Something that can GET a URL.
///
/// Implementors must not retry: each call is one round trip that either
/// yields a 2xx body or fails. The returned future is `Send` so fetches can
/// be spawned onto a multi-threaded runtime.
pub trait Fetcher {
    /// Fetch `url`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the URL is not absolute `http(s)`, on
    /// connection failure, on timeout, or on a non-2xx status.
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchResult, FetchError>> + Send;
}

impl<T: Fetcher + Sync> Fetcher for &T {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResult, FetchError> {
        (**self).fetch(url, timeout).await
    }
}

/// Parse and check a URL before anything goes on the wire.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed =
        Url::parse(url).map_err(|e| FetchError::new(url, FetchCause::InvalidUrl(e.to_string())))?;
    if !is_web_url(&parsed) {
        return Err(FetchError::new(
            url,
            FetchCause::InvalidUrl(format!("unsupported scheme `{}`", parsed.scheme())),
        ));
    }
    Ok(parsed)
}

/// [`Fetcher`] backed by a shared `reqwest` client and its connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher that sends `user_agent` with every request.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

/// The `charset` parameter of a `Content-Type` value.
pub fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::new(url, FetchCause::Timeout(timeout))
    } else {
        FetchError::new(url, FetchCause::Transport(e))
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResult, FetchError> {
        let parsed = validate_url(url)?;
        let t0 = Instant::now();

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success response");
            return Err(FetchError::new(url, FetchCause::Status(status.as_u16())));
        }

        let effective = response.url().to_string();
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_param);
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        debug!(
            bytes = body.len(),
            %effective,
            charset = charset.as_deref(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(FetchResult::new(effective, body.to_vec()).with_charset(charset))
    }
}
