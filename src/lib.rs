//! Syndication feed ingestion.
//!
//! Fetches RSS 2.0, Atom and RDF feeds over HTTP(S), normalizes their entries
//! into [`feed::UnifiedItem`]s and keeps results in a shared in-memory
//! [`cache::CacheStore`] fronted by [`service::IngestionService`].

pub mod cache;
pub mod config;
pub mod events;
pub mod feed;
pub mod service;
pub mod util;
