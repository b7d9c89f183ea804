//! Named sources: a symbolic name mapped to URLs and an extraction rule.
//!
//! The built-in table ([`Registry::builtin`]) covers a set of member and
//! committee sites. More entries can be merged in from YAML rule tables at
//! runtime with [`Registry::extend_from_yaml`]. Every entry is validated
//! when it is registered.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_yaml::with::singleton_map_recursive;
use tracing::debug;

use crate::error::RegistryError;
use crate::fetch::validate_url;
use crate::pipeline::Source;
use crate::rules::ExtractionRule;

/// Placeholder for the page number in URL templates.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Whose press releases an entry collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceGroup {
    /// An individual senator's or representative's site.
    #[default]
    Member,
    /// Committee and caucus pages, usually tagged with a party.
    Committee,
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceGroup::Member => f.write_str("member"),
            SourceGroup::Committee => f.write_str("committee"),
        }
    }
}

fn default_first_page() -> u32 {
    1
}

/// An entry as written in a rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub group: SourceGroup,
    /// URL templates. `{page}` is replaced by the page number.
    pub urls: Vec<String>,
    /// Page number of the newest listing page. Some sites count from 0.
    #[serde(default = "default_first_page")]
    pub first_page: u32,
    pub rule: ExtractionRule,
}

impl RegistryEntry {
    pub fn new(name: &str, group: SourceGroup, urls: &[&str], rule: ExtractionRule) -> Self {
        Self {
            name: name.to_string(),
            group,
            urls: urls.iter().map(|u| u.to_string()).collect(),
            first_page: default_first_page(),
            rule,
        }
    }

    pub fn first_page(mut self, page: u32) -> Self {
        self.first_page = page;
        self
    }
}

/// A registered, validated entry.
#[derive(Debug, Clone)]
pub struct NamedSource {
    pub name: String,
    pub group: SourceGroup,
    pub urls: Vec<String>,
    pub first_page: u32,
    pub rule: Arc<ExtractionRule>,
}

impl NamedSource {
    /// One [`Source`] per URL template, for `page` or the first page.
    pub fn sources(&self, page: Option<u32>) -> Vec<Source> {
        let page = page.unwrap_or(self.first_page).to_string();
        self.urls
            .iter()
            .map(|template| {
                Source::scraped(template.replace(PAGE_PLACEHOLDER, &page), Arc::clone(&self.rule))
                    .named(&self.name)
            })
            .collect()
    }

    /// Read `url` with this entry's rule instead of its own URLs.
    pub fn at(&self, url: &str) -> Source {
        Source::scraped(url, Arc::clone(&self.rule)).named(&self.name)
    }
}

/// Lookup table from name to [`NamedSource`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, NamedSource>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in entry.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in builtin::entries() {
            registry.register(entry)?;
        }
        debug!(entries = registry.len(), "Loaded built-in registry");
        Ok(registry)
    }

    /// Add an entry.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, there are no URLs, a URL template does
    /// not expand to an absolute `http(s)` URL, or the rule is invalid.
    pub fn register(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        let named = self.check(entry)?;
        self.entries.insert(named.name.clone(), named);
        Ok(())
    }

    fn check(&self, entry: RegistryEntry) -> Result<NamedSource, RegistryError> {
        let name = entry.name.trim().to_string();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        if entry.urls.is_empty() {
            return Err(RegistryError::NoUrls { name });
        }
        for template in &entry.urls {
            let expanded = template.replace(PAGE_PLACEHOLDER, &entry.first_page.to_string());
            if validate_url(&expanded).is_err() {
                return Err(RegistryError::InvalidUrl {
                    name,
                    template: template.clone(),
                });
            }
        }
        entry
            .rule
            .validate()
            .map_err(|error| RegistryError::InvalidRule {
                name: name.clone(),
                error,
            })?;

        Ok(NamedSource {
            name,
            group: entry.group,
            urls: entry.urls,
            first_page: entry.first_page,
            rule: Arc::new(entry.rule),
        })
    }

    pub fn get(&self, name: &str) -> Result<&NamedSource, RegistryError> {
        self.entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSource(name.to_string()))
    }

    /// Sources for `name` at `page` (or the entry's first page).
    pub fn sources(&self, name: &str, page: Option<u32>) -> Result<Vec<Source>, RegistryError> {
        Ok(self.get(name)?.sources(page))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).sorted().collect()
    }

    /// Entries of one group, sorted by name.
    pub fn group(&self, group: SourceGroup) -> Vec<&NamedSource> {
        self.entries
            .values()
            .filter(|e| e.group == group)
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge a YAML list of [`RegistryEntry`] values.
    ///
    /// Rules use the same single-key map form as
    /// [`ExtractionRule::from_yaml`]. Nothing is added unless every entry is
    /// valid; the first invalid one is returned as the error. Returns how
    /// many were added.
    pub fn extend_from_yaml(&mut self, yaml: &str) -> Result<usize, RegistryError> {
        let entries: Vec<RegistryEntry> =
            singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))?;

        let mut checked: Vec<NamedSource> = Vec::with_capacity(entries.len());
        for entry in entries {
            let named = self.check(entry)?;
            if checked.iter().any(|c| c.name == named.name) {
                return Err(RegistryError::Duplicate(named.name));
            }
            checked.push(named);
        }

        let count = checked.len();
        self.entries
            .extend(checked.into_iter().map(|named| (named.name.clone(), named)));
        Ok(count)
    }

    /// [`Registry::extend_from_yaml`] on the contents of a file.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let added = self.extend_from_yaml(&yaml)?;
        debug!(path = %path.display(), added, "Merged rule table");
        Ok(added)
    }
}
