//! Applying an [`ExtractionRule`] to a parsed [`Document`].
//!
//! The item locator selects the repeating containers; every other locator is
//! evaluated inside one container. When a locator matches several elements
//! the first in document order is used.
//!
//! Containers without a title or link are usually header rows, ads or
//! pagination widgets. They are dropped here without being reported. A
//! container without a date is kept; [`crate::normalize`] decides what
//! happens to it.

use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::document::{Document, XmlElement};
use crate::error::{PipelineError, RuleError, RuleMismatchError};
use crate::models::RawRecord;
use crate::rules::{ExtractionRule, Locator, LocatorStrategy, PartyRule, ValueSource};

/// Pull raw field values out of every item container in `document`.
///
/// # Errors
///
/// [`RuleMismatchError`] when the rule requires items and the item locator
/// matches nothing. [`RuleError`] if a selector fails to compile, which
/// cannot happen for rules that passed [`ExtractionRule::validate`].
pub fn apply(rule: &ExtractionRule, document: &Document) -> Result<Vec<RawRecord>, PipelineError> {
    let records = match document {
        Document::Xml(doc) => {
            let containers = select_xml(&rule.items, &doc.root);
            check_items(rule, containers.len())?;
            window(rule, containers)
                .filter_map(|container| Fields::from_xml(rule, container).into_raw())
                .collect()
        }
        Document::Html(html) => {
            let containers = select_html(&rule.items, html.root_element())?;
            check_items(rule, containers.len())?;
            let mut out = Vec::new();
            for container in window(rule, containers) {
                if let Some(raw) = Fields::from_html(rule, container)?.into_raw() {
                    out.push(raw);
                }
            }
            out
        }
    };
    Ok(records)
}

fn check_items(rule: &ExtractionRule, found: usize) -> Result<(), RuleMismatchError> {
    debug!(containers = found, items = %rule.items.describe(), "Located item containers");
    if found == 0 && rule.require_items {
        return Err(RuleMismatchError {
            locator: rule.items.describe(),
        });
    }
    Ok(())
}

fn window<T>(rule: &ExtractionRule, containers: Vec<T>) -> impl Iterator<Item = T> {
    containers
        .into_iter()
        .skip(rule.skip_items)
        .take(rule.limit.unwrap_or(usize::MAX))
}

/// Field values found in one container, before the title/link check.
struct Fields {
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    party: Option<String>,
}

impl Fields {
    fn into_raw(self) -> Option<RawRecord> {
        match (self.title, self.link) {
            (Some(title), Some(link)) => Some(RawRecord {
                title,
                link,
                date: self.date,
                party: self.party,
            }),
            (title, link) => {
                debug!(
                    has_title = title.is_some(),
                    has_link = link.is_some(),
                    "Dropping container without title or link"
                );
                None
            }
        }
    }

    fn from_xml(rule: &ExtractionRule, container: &XmlElement) -> Self {
        let read = |locator: &Locator| {
            select_xml(&locator.strategy, container)
                .first()
                .and_then(|el| read_xml(el, &locator.value))
        };
        Self {
            title: read(&rule.title),
            link: read(&rule.link),
            date: rule.date.locator.as_ref().and_then(read),
            party: match &rule.party {
                Some(PartyRule::Fixed(tag)) => Some(tag.clone()),
                Some(PartyRule::Located(locator)) => read(locator),
                None => None,
            },
        }
    }

    fn from_html(rule: &ExtractionRule, container: ElementRef<'_>) -> Result<Self, RuleError> {
        let read = |locator: &Locator| -> Result<Option<String>, RuleError> {
            Ok(select_html(&locator.strategy, container)?
                .first()
                .and_then(|el| read_html(*el, &locator.value)))
        };
        Ok(Self {
            title: read(&rule.title)?,
            link: read(&rule.link)?,
            date: match &rule.date.locator {
                Some(locator) => read(locator)?,
                None => None,
            },
            party: match &rule.party {
                Some(PartyRule::Fixed(tag)) => Some(tag.clone()),
                Some(PartyRule::Located(locator)) => read(locator)?,
                None => None,
            },
        })
    }
}

fn pick_value(
    value: &ValueSource,
    text: impl FnOnce() -> String,
    attr: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    match value {
        ValueSource::Text => Some(text()),
        ValueSource::Attr(name) => attr(name),
        ValueSource::TextThenAttr(name) => {
            let t = text();
            if t.trim().is_empty() {
                attr(name).or(Some(t))
            } else {
                Some(t)
            }
        }
        ValueSource::AttrThenText(name) => match attr(name) {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => Some(text()),
        },
    }
}

fn read_html(el: ElementRef<'_>, value: &ValueSource) -> Option<String> {
    pick_value(
        value,
        || el.text().collect::<String>(),
        |name| el.value().attr(name).map(str::to_string),
    )
}

fn read_xml(el: &XmlElement, value: &ValueSource) -> Option<String> {
    pick_value(value, || el.text(), |name| el.attr(name).map(str::to_string))
}

/// Elements matching `strategy` below (or, for structural strategies, at)
/// `scope`, in document order.
pub fn select_html<'a>(
    strategy: &LocatorStrategy,
    scope: ElementRef<'a>,
) -> Result<Vec<ElementRef<'a>>, RuleError> {
    match strategy {
        LocatorStrategy::SelfNode => Ok(vec![scope]),
        LocatorStrategy::PreviousSibling => Ok(scope
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .take(1)
            .collect()),
        LocatorStrategy::Nth { of, index } => {
            Ok(select_html(of, scope)?.into_iter().nth(*index).into_iter().collect())
        }
        other => {
            let css = other.to_css()?;
            let selector = Selector::parse(&css)
                .map_err(|e| RuleError::new("locator", format!("bad selector `{css}`: {e}")))?;
            Ok(scope.select(&selector).collect())
        }
    }
}

/// XML counterpart of [`select_html`]. Tag names compare case-insensitively.
pub fn select_xml<'a>(strategy: &LocatorStrategy, scope: &'a XmlElement) -> Vec<&'a XmlElement> {
    match strategy {
        LocatorStrategy::SelfNode => vec![scope],
        LocatorStrategy::Nth { of, index } => {
            select_xml(of, scope).into_iter().nth(*index).into_iter().collect()
        }
        LocatorStrategy::Descendant(steps) => {
            let mut found = Vec::new();
            descend(steps, scope, &mut found);
            in_document_order(scope, &found)
        }
        LocatorStrategy::Any(options) => {
            let found: Vec<_> = options.iter().flat_map(|o| select_xml(o, scope)).collect();
            in_document_order(scope, &found)
        }
        // Rejected for xml rules by validation.
        LocatorStrategy::Css(_) | LocatorStrategy::PreviousSibling => Vec::new(),
        simple => scope
            .descendants()
            .into_iter()
            .filter(|el| matches_xml(simple, el))
            .collect(),
    }
}

fn descend<'a>(steps: &[LocatorStrategy], scope: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    let Some((first, rest)) = steps.split_first() else {
        return;
    };
    for el in select_xml(first, scope) {
        if rest.is_empty() {
            out.push(el);
        } else {
            descend(rest, el, out);
        }
    }
}

// Deduplicates by identity and restores document order.
fn in_document_order<'a>(scope: &'a XmlElement, found: &[&'a XmlElement]) -> Vec<&'a XmlElement> {
    scope
        .descendants()
        .into_iter()
        .filter(|el| found.iter().any(|f| std::ptr::eq(*f, *el)))
        .collect()
}

fn matches_xml(strategy: &LocatorStrategy, el: &XmlElement) -> bool {
    match strategy {
        LocatorStrategy::Tag(name) => el.name.eq_ignore_ascii_case(name),
        LocatorStrategy::TagClass { tag, class } => {
            el.name.eq_ignore_ascii_case(tag)
                && el
                    .attr("class")
                    .is_some_and(|c| c.split_whitespace().any(|c| c == class.as_str()))
        }
        LocatorStrategy::Attribute { tag, name, value } => {
            tag.as_ref().is_none_or(|t| el.name.eq_ignore_ascii_case(t))
                && match (el.attr(name), value) {
                    (Some(actual), Some(expected)) => actual == expected.as_str(),
                    (Some(_), None) => true,
                    (None, _) => false,
                }
        }
        _ => false,
    }
}
