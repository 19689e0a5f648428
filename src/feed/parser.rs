use serde::Serialize;
use thiserror::Error;

use super::xml::{parse_document, Element};
use crate::util::clean_description;

const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
const DUBLIN_CORE_NS: &str = "http://purl.org/dc/elements/1.1/";

/// A feed entry normalized across RSS 2.0, Atom and RDF.
///
/// Absent values are empty strings; `published_at` is passed through exactly
/// as the feed wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedItem {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub published_at: String,
    #[serde(rename = "contentSnippet")]
    pub snippet: String,
}

/// No schema produced any items (or the document could not be decoded at all).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("failed to parse feed")]
pub struct ParseError;

/// One feed format, probed against an already decoded document.
pub trait FeedSchema: Sync {
    fn name(&self) -> &'static str;

    /// Returns the mapped items, or `None` when this schema finds none.
    fn try_parse(&self, root: &Element) -> Option<Vec<UnifiedItem>>;
}

/// Probe order matters: a document that fits an earlier shape is taken by it.
static SCHEMAS: &[&dyn FeedSchema] = &[&Rss2, &Atom, &Rdf];

/// Parses raw feed bytes into unified items.
///
/// Tries RSS 2.0, then Atom, then RDF/RSS 1.0 and returns the first non-empty
/// result. Sparse fields in the winning schema never cause a fall through.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<UnifiedItem>, ParseError> {
    let root = parse_document(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Feed document could not be decoded");
        ParseError
    })?;

    for schema in SCHEMAS {
        if let Some(items) = schema.try_parse(&root) {
            tracing::trace!(schema = schema.name(), items = items.len(), "Feed schema matched");
            return Ok(items);
        }
    }

    Err(ParseError)
}

fn non_empty(items: Vec<UnifiedItem>) -> Option<Vec<UnifiedItem>> {
    (!items.is_empty()).then_some(items)
}

fn snippet_with_fallback(primary: &str, fallback: &str) -> String {
    let cleaned = clean_description(primary);
    if cleaned.is_empty() {
        clean_description(fallback)
    } else {
        cleaned
    }
}

struct Rss2;

impl FeedSchema for Rss2 {
    fn name(&self) -> &'static str {
        "rss2"
    }

    fn try_parse(&self, root: &Element) -> Option<Vec<UnifiedItem>> {
        let items = root
            .children_named("channel")
            .flat_map(|channel| channel.children_named("item"))
            .map(|item| {
                let mut link = item.child_text("link").trim();
                if link.is_empty() {
                    link = item.child_text("guid").trim();
                }
                UnifiedItem {
                    title: item.child_text("title").to_string(),
                    link: link.to_string(),
                    published_at: item.child_text("pubDate").to_string(),
                    snippet: snippet_with_fallback(
                        item.child_text("description"),
                        item.child_text_ns(CONTENT_NS, "encoded"),
                    ),
                }
            })
            .collect();
        non_empty(items)
    }
}

struct Atom;

impl FeedSchema for Atom {
    fn name(&self) -> &'static str {
        "atom"
    }

    fn try_parse(&self, root: &Element) -> Option<Vec<UnifiedItem>> {
        let items = root
            .children_named("entry")
            .map(|entry| UnifiedItem {
                title: entry.child_text("title").to_string(),
                link: pick_atom_link(entry),
                published_at: entry.child_text("updated").to_string(),
                snippet: snippet_with_fallback(
                    entry.child_text("summary"),
                    entry.child_text("content"),
                ),
            })
            .collect();
        non_empty(items)
    }
}

/// Prefers the entry's human-readable page: `rel` empty or `alternate`, with
/// `type` empty or HTML. Falls back to any link with an href.
fn pick_atom_link(entry: &Element) -> String {
    let is_page = |link: &Element| {
        let rel = link.attr("rel");
        let kind = link.attr("type");
        (rel.is_empty() || rel == "alternate") && (kind.is_empty() || kind.starts_with("text/html"))
    };

    entry
        .children_named("link")
        .filter(|link| !link.attr("href").is_empty())
        .find(|link| is_page(link))
        .or_else(|| {
            entry
                .children_named("link")
                .find(|link| !link.attr("href").is_empty())
        })
        .map(|link| link.attr("href").to_string())
        .unwrap_or_default()
}

struct Rdf;

impl FeedSchema for Rdf {
    fn name(&self) -> &'static str {
        "rdf"
    }

    fn try_parse(&self, root: &Element) -> Option<Vec<UnifiedItem>> {
        let items = root
            .children_named("item")
            .map(|item| UnifiedItem {
                title: item.child_text("title").to_string(),
                link: item.child_text("link").to_string(),
                published_at: item.child_text_ns(DUBLIN_CORE_NS, "date").to_string(),
                snippet: clean_description(item.child_text("description")),
            })
            .collect();
        non_empty(items)
    }
}
