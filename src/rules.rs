//! Declarative extraction rules.
//!
//! A feed or site is described by an [`ExtractionRule`]: where the repeating
//! item containers are, how to find title, link and date inside each one,
//! which date formats to expect, and a handful of per-site switches (base URL,
//! party tag, domain attribution). Rules are plain data: they deserialize from
//! YAML and are interpreted by [`crate::extract`] and [`crate::normalize`].
//!
//! The page layouts seen across congressional sites reduce to a small set of
//! [`LocatorStrategy`] variants:
//!
//! | Layout | Items | Fields |
//! |--------|-------|--------|
//! | RSS / Atom | `tag(item)` / `tag(entry)` | child tags |
//! | Table listing | `descendant([table.recordList, tr])` | `nth { of: td, index }` |
//! | Card layout | `tag_class { div, ArticleBlock }` | `css(h2 a)`, `tag(time)` |
//! | Drupal headings | `css(#newscontent h2)` | `self_node`, `previous_sibling` |
//!
//! Every rule is checked by [`ExtractionRule::validate`] when it is
//! registered, so a broken rule fails before any page is fetched.

use chrono::format::{Item, StrftimeItems};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_yaml::with::singleton_map_recursive;
use url::Url;

use crate::document::DocumentMode;
use crate::error::RuleError;
use crate::utils::is_web_url;

/// URL paths that point at a generic news index rather than a release.
pub const DEFAULT_GENERIC_PATHS: &[&str] = &["/news", "/news/"];

/// How to find elements relative to a scope element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Elements with this tag name.
    Tag(String),
    /// Elements with this tag carrying this class.
    TagClass { tag: String, class: String },
    /// Elements carrying an attribute, optionally with an exact value.
    Attribute {
        #[serde(default)]
        tag: Option<String>,
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Last step nested (at any depth) inside the previous ones.
    Descendant(Vec<LocatorStrategy>),
    /// A raw CSS selector. HTML only.
    Css(String),
    /// Union of several strategies, in document order.
    Any(Vec<LocatorStrategy>),
    /// The `index`-th (zero based) match of another strategy.
    Nth {
        of: Box<LocatorStrategy>,
        index: usize,
    },
    /// Closest preceding element sibling of the scope. HTML only.
    PreviousSibling,
    /// The scope element itself.
    SelfNode,
}

impl LocatorStrategy {
    pub fn tag(name: &str) -> Self {
        LocatorStrategy::Tag(name.to_string())
    }

    pub fn tag_class(tag: &str, class: &str) -> Self {
        LocatorStrategy::TagClass {
            tag: tag.to_string(),
            class: class.to_string(),
        }
    }

    pub fn attribute(tag: Option<&str>, name: &str, value: Option<&str>) -> Self {
        LocatorStrategy::Attribute {
            tag: tag.map(str::to_string),
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    pub fn css(selector: &str) -> Self {
        LocatorStrategy::Css(selector.to_string())
    }

    pub fn descendant(steps: Vec<LocatorStrategy>) -> Self {
        LocatorStrategy::Descendant(steps)
    }

    pub fn any(options: Vec<LocatorStrategy>) -> Self {
        LocatorStrategy::Any(options)
    }

    pub fn nth(of: LocatorStrategy, index: usize) -> Self {
        LocatorStrategy::Nth {
            of: Box::new(of),
            index,
        }
    }

    /// CSS form of this strategy, for strategies that have one.
    ///
    /// `Nth`, `PreviousSibling` and `SelfNode` are structural and are resolved
    /// by [`crate::extract`] directly.
    pub fn to_css(&self) -> Result<String, RuleError> {
        match self {
            LocatorStrategy::Tag(name) => Ok(name.clone()),
            LocatorStrategy::TagClass { tag, class } => Ok(format!("{tag}.{class}")),
            LocatorStrategy::Attribute { tag, name, value } => {
                let tag = tag.as_deref().unwrap_or("");
                Ok(match value {
                    Some(v) => format!("{tag}[{name}=\"{}\"]", v.replace('"', "\\\"")),
                    None => format!("{tag}[{name}]"),
                })
            }
            LocatorStrategy::Descendant(steps) => {
                let parts = steps
                    .iter()
                    .map(|s| s.to_css())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(" "))
            }
            LocatorStrategy::Css(selector) => Ok(selector.clone()),
            LocatorStrategy::Any(options) => {
                let parts = options
                    .iter()
                    .map(|s| s.to_css())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(", "))
            }
            LocatorStrategy::Nth { .. }
            | LocatorStrategy::PreviousSibling
            | LocatorStrategy::SelfNode => {
                Err(RuleError::new(
                    "locator",
                    format!("`{}` has no css form and cannot be nested", self.describe()),
                ))
            }
        }
    }

    /// Short human readable form, used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            LocatorStrategy::Nth { of, index } => format!("{}[{index}]", of.describe()),
            LocatorStrategy::PreviousSibling => "previous_sibling".to_string(),
            LocatorStrategy::SelfNode => "self".to_string(),
            other => other.to_css().unwrap_or_else(|_| format!("{other:?}")),
        }
    }

    fn validate(&self, field: &str, mode: DocumentMode) -> Result<(), RuleError> {
        match self {
            LocatorStrategy::Tag(name) if name.trim().is_empty() => {
                Err(RuleError::new(field, "tag name is empty"))
            }
            LocatorStrategy::TagClass { tag, class }
                if tag.trim().is_empty() || class.trim().is_empty() =>
            {
                Err(RuleError::new(field, "tag_class needs both a tag and a class"))
            }
            LocatorStrategy::TagClass { class, .. } if class.contains(char::is_whitespace) => {
                Err(RuleError::new(field, "tag_class matches a single class"))
            }
            LocatorStrategy::Attribute { name, .. } if name.trim().is_empty() => {
                Err(RuleError::new(field, "attribute name is empty"))
            }
            LocatorStrategy::Descendant(steps) | LocatorStrategy::Any(steps)
                if steps.is_empty() =>
            {
                Err(RuleError::new(field, "needs at least one step"))
            }
            LocatorStrategy::Descendant(steps) => {
                for step in steps {
                    step.validate_simple(field)?;
                    step.validate(field, mode)?;
                }
                self.check_selector(field, mode)
            }
            LocatorStrategy::Any(options) => {
                for option in options {
                    option.validate_simple(field)?;
                    option.validate(field, mode)?;
                }
                self.check_selector(field, mode)
            }
            LocatorStrategy::Nth { of, .. } => {
                if matches!(**of, LocatorStrategy::Nth { .. }) {
                    return Err(RuleError::new(field, "nth cannot wrap another nth"));
                }
                of.validate(field, mode)
            }
            LocatorStrategy::Css(_) | LocatorStrategy::PreviousSibling
                if mode == DocumentMode::Xml =>
            {
                Err(RuleError::new(
                    field,
                    format!("`{}` is only available in html mode", self.describe()),
                ))
            }
            LocatorStrategy::PreviousSibling | LocatorStrategy::SelfNode => Ok(()),
            _ => self.check_selector(field, mode),
        }
    }

    fn validate_simple(&self, field: &str) -> Result<(), RuleError> {
        match self {
            LocatorStrategy::Nth { .. }
            | LocatorStrategy::PreviousSibling
            | LocatorStrategy::SelfNode => {
                Err(RuleError::new(
                    field,
                    format!("`{}` cannot be nested in descendant or any", self.describe()),
                ))
            }
            _ => Ok(()),
        }
    }

    fn check_selector(&self, field: &str, mode: DocumentMode) -> Result<(), RuleError> {
        if mode == DocumentMode::Html {
            let css = self.to_css()?;
            Selector::parse(&css)
                .map_err(|e| RuleError::new(field, format!("bad selector `{css}`: {e}")))?;
        }
        Ok(())
    }
}

/// Which part of a located element supplies the value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Inner text.
    #[default]
    Text,
    /// An attribute.
    Attr(String),
    /// Inner text, or the attribute when the text is blank.
    TextThenAttr(String),
    /// The attribute, or the inner text when the attribute is absent or blank.
    AttrThenText(String),
}

impl ValueSource {
    fn attr_name(&self) -> Option<&str> {
        match self {
            ValueSource::Text => None,
            ValueSource::Attr(a) | ValueSource::TextThenAttr(a) | ValueSource::AttrThenText(a) => {
                Some(a)
            }
        }
    }
}

/// A located field: where to look, and what to read there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    #[serde(default)]
    pub value: ValueSource,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: ValueSource) -> Self {
        Self { strategy, value }
    }

    /// Inner text of the first match.
    pub fn text(strategy: LocatorStrategy) -> Self {
        Self::new(strategy, ValueSource::Text)
    }

    /// An attribute of the first match.
    pub fn attr(strategy: LocatorStrategy, name: &str) -> Self {
        Self::new(strategy, ValueSource::Attr(name.to_string()))
    }

    /// Text, falling back to the `title` attribute.
    pub fn title(strategy: LocatorStrategy) -> Self {
        Self::new(strategy, ValueSource::TextThenAttr("title".to_string()))
    }

    /// `href`, falling back to the element text.
    pub fn link(strategy: LocatorStrategy) -> Self {
        Self::new(strategy, ValueSource::AttrThenText("href".to_string()))
    }

    fn validate(&self, field: &str, mode: DocumentMode) -> Result<(), RuleError> {
        if let Some(attr) = self.value.attr_name() {
            if attr.trim().is_empty() {
                return Err(RuleError::new(field, "attribute name is empty"));
            }
        }
        self.strategy.validate(field, mode)
    }
}

/// Where a record's date comes from and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRule {
    #[serde(default)]
    pub locator: Option<Locator>,
    /// strftime formats tried in order; the first is the rule's hint.
    /// `rfc2822` and `rfc3339` name the corresponding standards.
    #[serde(default)]
    pub formats: Vec<String>,
    /// Try the shared well-known formats after `formats`.
    #[serde(default = "default_true")]
    pub well_known: bool,
    /// Keep records whose date cannot be determined, with the date unset.
    #[serde(default)]
    pub optional: bool,
    /// Query parameter of the source URL to read the date from when the
    /// item itself carries none (House GOP member-news pages).
    #[serde(default)]
    pub source_query_param: Option<String>,
}

fn default_true() -> bool {
    true
}

impl DateRule {
    pub fn new(locator: Locator, formats: &[&str]) -> Self {
        Self {
            locator: Some(locator),
            formats: formats.iter().map(|f| f.to_string()).collect(),
            well_known: true,
            optional: false,
            source_query_param: None,
        }
    }

    /// A rule that never yields a date; records keep `date` unset.
    pub fn none() -> Self {
        Self {
            locator: None,
            formats: Vec::new(),
            well_known: true,
            optional: true,
            source_query_param: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.well_known = false;
        self
    }

    pub fn from_source_query(mut self, param: &str) -> Self {
        self.source_query_param = Some(param.to_string());
        self
    }

    fn validate(&self, mode: DocumentMode) -> Result<(), RuleError> {
        if let Some(locator) = &self.locator {
            locator.validate("date", mode)?;
        }
        if self.locator.is_none() && self.source_query_param.is_none() && !self.optional {
            return Err(RuleError::new(
                "date",
                "no locator or source query parameter, and the date is not optional",
            ));
        }
        if !self.well_known && self.formats.is_empty() && !self.optional {
            return Err(RuleError::new(
                "date.formats",
                "well-known formats are disabled but no formats are given",
            ));
        }
        if let Some(param) = &self.source_query_param {
            if param.trim().is_empty() {
                return Err(RuleError::new("date.source_query_param", "parameter name is empty"));
            }
        }
        for format in &self.formats {
            validate_format(format)?;
        }
        Ok(())
    }
}

fn validate_format(format: &str) -> Result<(), RuleError> {
    if matches!(format, "rfc2822" | "rfc3339") {
        return Ok(());
    }
    if format.trim().is_empty() {
        return Err(RuleError::new("date.formats", "empty format"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(RuleError::new(
            "date.formats",
            format!("`{format}` is not a valid strftime format"),
        ));
    }
    Ok(())
}

/// Party or group tag attached to committee records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRule {
    /// Every record from this source gets the same tag, e.g. `majority`.
    Fixed(String),
    /// Read from each item.
    Located(Locator),
}

/// Which host a record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Host of the source URL.
    #[default]
    Source,
    /// Host of each record's own URL, for pages aggregating many sites.
    Item,
}

/// A complete description of how to pull records out of one kind of page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    #[serde(default)]
    pub mode: DocumentMode,
    /// The repeating container for one press release.
    pub items: LocatorStrategy,
    /// Containers to skip at the start (table header rows).
    #[serde(default)]
    pub skip_items: usize,
    /// Only look at the first N containers after skipping.
    #[serde(default)]
    pub limit: Option<usize>,
    pub title: Locator,
    pub link: Locator,
    pub date: DateRule,
    /// Resolve relative links against this instead of the fetched page URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub party: Option<PartyRule>,
    #[serde(default)]
    pub domain: DomainPolicy,
    /// A page with no containers is a [`crate::error::RuleMismatchError`].
    #[serde(default = "default_true")]
    pub require_items: bool,
    /// Release URLs with one of these paths are dropped.
    #[serde(default = "default_generic_paths")]
    pub generic_paths: Vec<String>,
}

fn default_generic_paths() -> Vec<String> {
    DEFAULT_GENERIC_PATHS.iter().map(|p| p.to_string()).collect()
}

impl ExtractionRule {
    /// Start a rule for an HTML listing page.
    pub fn html(items: LocatorStrategy, title: Locator, link: Locator, date: DateRule) -> Self {
        Self {
            mode: DocumentMode::Html,
            items,
            skip_items: 0,
            limit: None,
            title,
            link,
            date,
            base_url: None,
            party: None,
            domain: DomainPolicy::Source,
            require_items: true,
            generic_paths: default_generic_paths(),
        }
    }

    /// The generic RSS 2.0 / Atom rule used for plain feed URLs.
    pub fn feed() -> Self {
        let date = DateRule::new(
            Locator::text(LocatorStrategy::any(vec![
                LocatorStrategy::tag("pubDate"),
                LocatorStrategy::tag("published"),
                LocatorStrategy::tag("updated"),
                LocatorStrategy::tag("dc:date"),
            ])),
            &["rfc2822", "rfc3339"],
        )
        .optional();
        Self {
            mode: DocumentMode::Xml,
            items: LocatorStrategy::any(vec![
                LocatorStrategy::tag("item"),
                LocatorStrategy::tag("entry"),
            ]),
            title: Locator::text(LocatorStrategy::tag("title")),
            link: Locator::link(LocatorStrategy::tag("link")),
            date,
            ..Self::html(
                LocatorStrategy::tag("item"),
                Locator::text(LocatorStrategy::tag("title")),
                Locator::link(LocatorStrategy::tag("link")),
                DateRule::none(),
            )
        }
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip_items = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = Some(base.to_string());
        self
    }

    pub fn with_party(mut self, party: PartyRule) -> Self {
        self.party = Some(party);
        self
    }

    pub fn with_domain(mut self, policy: DomainPolicy) -> Self {
        self.domain = policy;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.require_items = false;
        self
    }

    /// Read a rule from YAML. Enum variants are single-key maps
    /// (`items: { tag: item }`) and unit variants plain strings (`self_node`).
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))
    }

    /// Check the rule for internal consistency.
    ///
    /// # Errors
    ///
    /// [`RuleError`] naming the offending field when a locator cannot be
    /// evaluated in the rule's mode, a selector does not compile, a date
    /// format is invalid, the base URL is not absolute, or the date has no
    /// source while being required.
    pub fn validate(&self) -> Result<(), RuleError> {
        if matches!(
            self.items,
            LocatorStrategy::SelfNode | LocatorStrategy::PreviousSibling
        ) {
            return Err(RuleError::new("items", "items must select elements from the document"));
        }
        self.items.validate("items", self.mode)?;
        if self.limit == Some(0) {
            return Err(RuleError::new("limit", "limit of zero selects nothing"));
        }
        self.title.validate("title", self.mode)?;
        self.link.validate("link", self.mode)?;
        self.date.validate(self.mode)?;
        if let Some(PartyRule::Located(locator)) = &self.party {
            locator.validate("party", self.mode)?;
        }
        if let Some(PartyRule::Fixed(tag)) = &self.party {
            if tag.trim().is_empty() {
                return Err(RuleError::new("party", "fixed party tag is empty"));
            }
        }
        if let Some(base) = &self.base_url {
            let parsed = Url::parse(base)
                .map_err(|e| RuleError::new("base_url", format!("`{base}`: {e}")))?;
            if !is_web_url(&parsed) {
                return Err(RuleError::new("base_url", format!("`{base}` is not an http(s) url")));
            }
        }
        Ok(())
    }
}
