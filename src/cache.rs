//! In-memory feed cache with a fixed time-to-live.
//!
//! Entries are replaced whole and never swept; an expired entry stays in the
//! map until a later successful fetch overwrites it. Freshness is checked
//! lazily by readers.
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::feed::UnifiedItem;

/// Default TTL for cached feeds (6 hours)
pub const DEFAULT_TTL_HOURS: i64 = 6;

/// Longest accepted TTL (ten years); larger values are clamped to it.
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

/// The cached items for one feed URL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Never empty. Shared so handing an entry to a caller is a refcount bump.
    pub items: Arc<[UnifiedItem]>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Maps trimmed feed URLs to their most recent non-empty fetch result.
///
/// Reads take a shared lock, writes an exclusive one; neither is held across
/// network I/O since callers fetch before calling [`CacheStore::put`].
#[derive(Debug)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_TTL_HOURS))
    }
}

impl CacheStore {
    /// Creates an empty store. The TTL is clamped to between one second and
    /// [`MAX_TTL_HOURS`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: ttl.clamp(Duration::seconds(1), Duration::hours(MAX_TTL_HOURS)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `url`, fresh or not.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Returns the entry for `url` only if it has not expired at `now`.
    pub fn get_fresh(&self, url: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.get(url).filter(|entry| Self::is_fresh(entry, now))
    }

    pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.is_fresh(now)
    }

    /// Stores `items` for `url`, expiring at `now + ttl`.
    ///
    /// An empty item list is ignored and any existing entry is left untouched.
    /// Returns whether the entry was written.
    pub fn put(
        &self,
        url: &str,
        items: impl Into<Arc<[UnifiedItem]>>,
        now: DateTime<Utc>,
    ) -> bool {
        let items = items.into();
        if items.is_empty() {
            return false;
        }

        // Saturates at the latest representable instant
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CacheEntry { items, expires_at };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), entry);
        true
    }

    /// Number of entries, including expired ones.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
