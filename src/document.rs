//! Parsing fetched bytes into a queryable document.
//!
//! Feeds are parsed with `quick-xml` into a small owned element tree
//! ([`XmlDocument`]). Press pages go through `scraper`, whose html5ever
//! backend recovers from the broken markup congressional sites routinely
//! serve, so HTML parsing only fails on an empty body.
//!
//! Bytes are decoded with `encoding_rs` before parsing. A byte order mark
//! wins, then the `Content-Type` charset, then a declaration inside the
//! document, then UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// How a fetched body should be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentMode {
    /// RSS or Atom feed.
    #[default]
    Xml,
    /// An HTML press-release listing.
    Html,
}

/// A parsed feed or page.
pub enum Document {
    Xml(XmlDocument),
    Html(Html),
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Document::Xml(doc) => f.debug_tuple("Xml").field(doc).finish(),
            Document::Html(_) => f.write_str("Html(..)"),
        }
    }
}

// Declarations must appear near the top; browsers look at the first 1024 bytes.
const SNIFF_LEN: usize = 1024;

static RE_XML_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*<\?xml\b[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).unwrap()
});
static RE_META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*?\bcharset\s*=\s*["']?\s*([A-Za-z0-9._:-]+)"#).unwrap()
});

/// Parse UTF-8 (or BOM-marked) `content` according to `mode`.
///
/// # Errors
///
/// See [`parse_with_charset`].
pub fn parse(content: &[u8], mode: DocumentMode) -> Result<Document, ParseError> {
    parse_with_charset(content, None, mode)
}

/// Parse `content` according to `mode`, decoding it with `charset` when the
/// server declared one.
///
/// # Errors
///
/// [`ParseError::Empty`] for blank input in either mode. In XML mode,
/// mismatched or unclosed tags and documents without an element fail too.
pub fn parse_with_charset(
    content: &[u8],
    charset: Option<&str>,
    mode: DocumentMode,
) -> Result<Document, ParseError> {
    let text = decode(content, charset, mode);
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    match mode {
        DocumentMode::Xml => XmlDocument::parse(&text).map(Document::Xml),
        DocumentMode::Html => Ok(Document::Html(Html::parse_document(&text))),
    }
}

/// Decode fetched bytes to text. Unknown labels fall through to the next
/// source of truth; undecodable bytes become U+FFFD.
pub fn decode<'a>(content: &'a [u8], charset: Option<&str>, mode: DocumentMode) -> Cow<'a, str> {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| declared_encoding(content, mode))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(content);
    text
}

fn declared_encoding(content: &[u8], mode: DocumentMode) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&content[..content.len().min(SNIFF_LEN)]);
    let re = match mode {
        DocumentMode::Xml => &RE_XML_ENCODING,
        DocumentMode::Html => &RE_META_CHARSET,
    };
    let label = re.captures(&head)?.get(1)?.as_str();
    // A UTF-16 label in ASCII-readable bytes is wrong; read it as UTF-8.
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

/// An XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `pubDate` or `dc:date`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let raw = String::from_utf8_lossy(&attr.value).into_owned();
                let value = unescape(&raw).map(Cow::into_owned).unwrap_or(raw);
                (key, value)
            })
            .collect();
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Value of the attribute `name`, compared case-insensitively.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of this element and everything below it.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Child elements, skipping text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Every element strictly below this one, in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        for child in self.elements() {
            child.walk(&mut out);
        }
        out
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a XmlElement>) {
        out.push(self);
        for child in self.elements() {
            child.walk(out);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// A parsed RSS/Atom document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// The document element (`rss`, `feed`, `rdf:RDF`, ...).
    pub root: XmlElement,
}

impl XmlDocument {
    /// Parse an XML string into an element tree.
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        let scrubbed = scrub_html_entities(xml);
        let mut reader = Reader::from_str(&scrubbed);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut roots: Vec<XmlElement> = Vec::new();

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| ParseError::Xml {
                position,
                message: e.to_string(),
            })?;
            match event {
                Event::Start(start) => stack.push(XmlElement::from_start(&start)),
                Event::Empty(start) => {
                    let element = XmlElement::from_start(&start);
                    attach(&mut stack, &mut roots, element);
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut roots, element);
                    }
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&text);
                        let decoded = unescape(&raw).unwrap_or(Cow::Borrowed(raw.as_ref()));
                        top.push_text(&decoded);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.push_text(&String::from_utf8_lossy(&data));
                    }
                }
                Event::GeneralRef(reference) => {
                    if let Some(top) = stack.last_mut() {
                        let name = String::from_utf8_lossy(&reference).into_owned();
                        if let Ok(Some(ch)) = reference.resolve_char_ref() {
                            top.push_text(ch.encode_utf8(&mut [0u8; 4]));
                        } else if let Some(resolved) = resolve_predefined_entity(&name) {
                            top.push_text(resolved);
                        } else {
                            top.push_text(&format!("&{name};"));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::Xml {
                position: reader.buffer_position(),
                message: format!("unclosed element `{}`", stack[stack.len() - 1].name),
            });
        }

        roots.into_iter().next().map(|root| Self { root }).ok_or(ParseError::NoRoot)
    }
}

fn attach(stack: &mut [XmlElement], roots: &mut Vec<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => roots.push(element),
    }
}

// Feeds often carry HTML entities that are not defined in XML.
fn scrub_html_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&ndash;", "-")
            .replace("&mdash;", "-")
            .replace("&ldquo;", "\"")
            .replace("&rdquo;", "\"")
            .replace("&lsquo;", "'")
            .replace("&rsquo;", "'")
            .replace("&hellip;", "..."),
    )
}
