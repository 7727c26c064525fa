//! Result cache for all-sources lookups
//!
//! Maps a normalized postal code to the full per-source result map. Entries
//! expire after a fixed TTL; expiry is checked on read and a stale entry is
//! evicted whole. There is no background sweeper.
//!
//! Timestamps use `tokio::time::Instant` so a paused test clock drives expiry.

use crate::types::{PostalCode, SourceResultMap};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    results: SourceResultMap,
    inserted_at: Instant,
}

/// Process-wide cache shared by every lookup
///
/// The lock is held only for map access, never across an await. Two
/// concurrent misses for the same key both fan out and both write; the last
/// write wins.
pub struct ResultCache {
    entries: Mutex<HashMap<PostalCode, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached map for a code, None when absent or expired
    pub fn get(&self, cep: &PostalCode) -> Option<SourceResultMap> {
        let mut entries = self.lock();
        let entry = entries.get(cep)?;

        if entry.inserted_at.elapsed() > self.ttl {
            debug!(cep = %cep, "Cache entry expired");
            entries.remove(cep);
            return None;
        }

        debug!(cep = %cep, "Cache hit");
        Some(entry.results.clone())
    }

    /// Store (or replace) the map for a code
    pub fn put(&self, cep: &PostalCode, results: SourceResultMap) {
        self.lock().insert(
            cep.clone(),
            CacheEntry {
                results,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Entries currently held, expired ones included until next read
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PostalCode, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
