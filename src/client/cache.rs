//! Range-addressable freshness cache for read results.
//!
//! One entry per path covers the byte range the server actually returned.
//! A read is served locally iff the requested range lies inside the covered
//! range and the entry is younger than the freshness window. On a miss the
//! caller fetches from the server and reconciles against the reply's mtime:
//! no prior entry stores, an equal mtime merely refreshes the clock, a
//! differing mtime replaces the entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    bytes: Vec<u8>,
    offset: u64,
    fetched_at: Instant,
    modified_ms: i64,
}

impl CacheEntry {
    /// Whether `[offset, offset + length)` lies inside the covered range.
    /// Coverage is the byte count actually stored, so an incomplete read
    /// never claims more than the server returned.
    fn covers(&self, offset: u64, length: u64) -> bool {
        let Some(end) = offset.checked_add(length) else {
            return false;
        };
        offset >= self.offset && end <= self.offset + self.bytes.len() as u64
    }
}

#[derive(Debug)]
pub struct ReadCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    freshness: Duration,
}

impl ReadCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            freshness,
        }
    }

    /// Returns the requested slice when the entry covers it and is still
    /// within the freshness window.
    pub async fn lookup(&self, path: &str, offset: u64, length: u64) -> Option<Vec<u8>> {
        let entries = self.entries.lock().await;
        let entry = entries.get(path)?;
        if entry.fetched_at.elapsed() >= self.freshness {
            debug!(path, "cache entry stale");
            return None;
        }
        if !entry.covers(offset, length) {
            debug!(path, offset, length, "requested range not covered");
            return None;
        }
        let start = (offset - entry.offset) as usize;
        Some(entry.bytes[start..start + length as usize].to_vec())
    }

    /// The entry's recorded server mtime when it covers the range, fresh or
    /// not. Used for the three-way reconciliation after a server read.
    pub async fn modified_ms(&self, path: &str, offset: u64, length: u64) -> Option<i64> {
        let entries = self.entries.lock().await;
        let entry = entries.get(path)?;
        entry.covers(offset, length).then_some(entry.modified_ms)
    }

    /// Stores a fetched range, replacing any prior entry for the path.
    pub async fn store(&self, path: &str, bytes: Vec<u8>, offset: u64, modified_ms: i64) {
        let entry = CacheEntry {
            bytes,
            offset,
            fetched_at: Instant::now(),
            modified_ms,
        };
        self.entries.lock().await.insert(path.to_string(), entry);
    }

    /// Refreshes an entry's clock after the server confirmed the file is
    /// unchanged. The payload is retained. Returns false if no entry exists.
    pub async fn revalidate(&self, path: &str, modified_ms: i64) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(path) {
            Some(entry) => {
                entry.fetched_at = Instant::now();
                entry.modified_ms = modified_ms;
                true
            }
            None => false,
        }
    }

    /// Drops the entry for `path`, if any.
    pub async fn invalidate(&self, path: &str) {
        self.entries.lock().await.remove(path);
    }
}
