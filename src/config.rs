//! Runtime settings, read from an optional YAML file.
//!
//! ```yaml
//! timeout_secs: 20
//! concurrency: 4
//! relative_dates: false
//! registry_files:
//!   - rules/house.yaml
//! ```
//!
//! Missing keys take their defaults. Relative `registry_files` paths are
//! resolved against the directory of the settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_CONCURRENCY;
use crate::error::ConfigError;
use crate::fetch::DEFAULT_USER_AGENT;
use crate::pipeline::PipelineOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Sources fetched at once.
    pub concurrency: usize,
    pub user_agent: String,
    /// Parse "today" and "3 days ago" against the local date.
    pub relative_dates: bool,
    /// Extra rule tables merged into the built-in registry.
    pub registry_files: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            relative_dates: true,
            registry_files: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let mut settings = Self::from_yaml(&yaml, &display)?;
        if let Some(dir) = path.parent() {
            for file in &mut settings.registry_files {
                if file.is_relative() {
                    *file = dir.join(&*file);
                }
            }
        }
        Ok(settings)
    }

    /// Parse settings from YAML text. `origin` names the text in errors.
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        // An empty file is valid and means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for a run started on `today`.
    pub fn pipeline_options(&self, today: NaiveDate) -> PipelineOptions {
        PipelineOptions {
            timeout: self.timeout(),
            reference_date: self.relative_dates.then_some(today),
        }
    }
}
