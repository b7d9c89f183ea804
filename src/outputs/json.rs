//! JSON output.
//!
//! A batch is written as one object:
//!
//! ```text
//! {
//!   "records": [{"source": ..., "url": ..., "title": ..., "date": "2025-01-05", "domain": ...}],
//!   "failures": [{"source": ..., "stage": "fetching", "kind": "fetch", "error": ...}],
//!   "succeeded": 3
//! }
//! ```

use std::error::Error;
use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tracing::{error, info, instrument};

use crate::models::BatchOutcome;

/// Pretty-printed JSON with a trailing newline.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Write `value` to `path`, or to stdout when `path` is `None`.
///
/// Parent directories of `path` are created as needed.
#[instrument(level = "info", skip_all, fields(path = ?path))]
pub async fn write_json<T: Serialize + ?Sized>(
    value: &T,
    path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let json = to_json(value)?;
    match path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if let Err(e) = fs::create_dir_all(dir).await {
                    error!(dir = %dir.display(), error = %e, "Failed to create output dir");
                    return Err(e.into());
                }
            }
            fs::write(path, json).await?;
            info!(path = %path.display(), "Wrote JSON");
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(json.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// [`write_json`] for a batch, logging its size first.
pub async fn write_outcome(
    outcome: &BatchOutcome,
    path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    info!(
        records = outcome.records.len(),
        failures = outcome.failures.len(),
        "Writing batch outcome"
    );
    write_json(outcome, path).await
}
