//! Charset-aware decoding of a feed document into a small element tree.
//!
//! The tree keeps only what the schema probes need: resolved namespace,
//! local name, attributes, the element's own character data, and children.
use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth. Real feeds rarely exceed 10.
const MAX_DEPTH: usize = 256;

/// How many leading bytes are scanned for an `<?xml ... encoding="..."?>` declaration.
const PROLOG_SCAN_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported document encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Entity references outside the five XML built-ins (e.g. `&nbsp;`)
    #[error("Invalid entity reference: {0}")]
    Entity(String),

    #[error("Element nesting exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Document ended inside <{0}>")]
    Unterminated(String),

    #[error("Document has no root element")]
    NoRoot,
}

/// One decoded XML element.
#[derive(Debug, Clone, Default)]
pub struct Element {
    namespace: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Character data directly inside this element (CDATA included, children excluded).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value by local name, or `""` when absent.
    pub fn attr(&self, name: &str) -> &str {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// Children with the given local name, in any namespace.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with the given local name (any namespace) that
    /// has non-empty text, or `""`.
    pub fn child_text(&self, name: &str) -> &str {
        self.children
            .iter()
            .filter(|c| c.name == name)
            .map(Element::text)
            .find(|t| !t.is_empty())
            .unwrap_or("")
    }

    /// Like [`Element::child_text`] but the child must be bound to `namespace`.
    pub fn child_text_ns(&self, namespace: &str, name: &str) -> &str {
        self.children
            .iter()
            .filter(|c| c.name == name && c.namespace() == Some(namespace))
            .map(Element::text)
            .find(|t| !t.is_empty())
            .unwrap_or("")
    }
}

/// Decodes raw feed bytes into the tree rooted at the document element.
///
/// Only the first top-level element is read; anything after it is ignored.
/// Entity references other than the XML built-ins and character references
/// are errors, as in any conforming XML parser.
pub fn parse_document(bytes: &[u8]) -> Result<Element, DecodeError> {
    let text = transcode(bytes)?;
    // SEC-002: quick-xml never expands DOCTYPE entity declarations (see Cargo.toml pin)
    let mut reader = NsReader::from_str(&text);

    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = namespace_of(resolved);

        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(DecodeError::MaxDepthExceeded(MAX_DEPTH));
                }
                stack.push(open_element(namespace, &start)?);
            }
            Event::Empty(start) => {
                let element = open_element(namespace, &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(t) => {
                if let Some(current) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| DecodeError::Entity(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match stack.pop() {
        Some(open) => Err(DecodeError::Unterminated(open.name)),
        None => Err(DecodeError::NoRoot),
    }
}

/// Converts the input to UTF-8, honouring a byte-order mark first and the XML
/// declaration's `encoding` label second. Undeclared input is taken as UTF-8.
fn transcode(bytes: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Ok(text);
    }

    let encoding = match declared_encoding(bytes) {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or(DecodeError::UnsupportedEncoding(label))?,
        None => UTF_8,
    };
    if encoding != UTF_8 {
        tracing::trace!(encoding = encoding.name(), "Transcoding feed document");
    }

    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    Ok(text)
}

fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(PROLOG_SCAN_LIMIT)]);
    let decl = head.trim_start().strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];

    let after_key = &decl[decl.find("encoding")? + "encoding".len()..];
    let value = after_key.trim_start().strip_prefix('=')?.trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &value[1..];
    let label = value[..value.find(quote)?].trim();

    (!label.is_empty()).then(|| label.to_string())
}

fn namespace_of(resolved: ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn open_element(
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<Element, DecodeError> {
    let mut attributes = Vec::new();
    for attr_result in start.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed XML attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DecodeError::Entity(e.to_string()))?;
        attributes.push((key, value.into_owned()));
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}
