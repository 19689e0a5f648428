//! Feed ingestion: fetching and parsing RSS 2.0, Atom and RDF feeds.
//!
//! - **Candidates**: bare hosts expand to `https://` then `http://` URLs
//! - **Attempts**: browser-identity rotation with an optional proxy fallback
//! - **Fetching**: timeout-bounded GETs composed into [`FeedFetcher`]
//! - **Parsing**: charset-aware XML decoding probed against three schemas
//!
//! # Example
//!
//! ```ignore
//! use siphon::feed::{FeedFetcher, FetchOptions};
//!
//! let fetcher = FeedFetcher::new(FetchOptions::default(), None)?;
//! let items = fetcher.fetch("blog.example.com/rss.xml").await?;
//! ```

mod attempts;
mod candidates;
mod fetcher;
mod parser;
mod xml;

pub use attempts::{
    build_headers, plan_attempts, referer_for, FetchAttempt, HttpClients, Transport,
    CHROME_USER_AGENT, DEFAULT_ACCEPT_LANGUAGE, SAFARI_USER_AGENT,
};
pub use candidates::resolve_candidates;
pub use fetcher::{
    execute, FeedError, FeedFetcher, FetchError, FetchOptions, DEFAULT_MAX_FEED_SIZE,
    DEFAULT_TIMEOUT,
};
pub use parser::{parse_feed, ParseError, UnifiedItem};
pub use xml::{parse_document, DecodeError, Element};
