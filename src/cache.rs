//! In-memory cache for analysis results.
//!
//! Entries are keyed by document identity. Keys are normalized to the
//! lower-cased final path segment, with `.ahk2` folded into `.ahk`, so
//! `C:\Lib\Util.AHK2` and `util.ahk` share a slot. Each entry remembers the
//! version and a content fingerprint of the text it was computed from;
//! callers compare both before trusting a hit.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::analysis::{DocumentVersion, FunctionMetadata};

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A cached analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub version: DocumentVersion,
    /// Hash of the analyzed text.
    pub fingerprint: u64,
    pub functions: Arc<Vec<FunctionMetadata>>,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    /// Insertion time of the oldest entry, Unix milliseconds.
    pub oldest_entry_timestamp: Option<u64>,
    /// Insertion time of the newest entry, Unix milliseconds.
    pub newest_entry_timestamp: Option<u64>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedAnalysis,
    timestamp: u64, // Unix timestamp in milliseconds
}

/// TTL-bounded store of analysis results.
///
/// Construct one per session and share it behind an `Arc`.
#[derive(Debug)]
pub struct MetadataCache {
    memory: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a result, replacing any previous entry for the same key.
    pub fn set(&self, key: &str, value: CachedAnalysis) {
        self.set_at(key, value, current_timestamp());
    }

    fn set_at(&self, key: &str, value: CachedAnalysis, timestamp: u64) {
        if let Ok(mut cache) = self.memory.write() {
            cache.insert(normalize_key(key), CacheEntry { value, timestamp });
        }
    }

    /// Get a cached result if it exists and is not expired.
    pub fn get(&self, key: &str) -> Option<CachedAnalysis> {
        self.get_at(key, current_timestamp())
    }

    fn get_at(&self, key: &str, now: u64) -> Option<CachedAnalysis> {
        let cache = self.memory.read().ok()?;
        let entry = cache.get(&normalize_key(key))?;
        if self.is_expired(entry, now) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Whether an entry is physically present, expired or not.
    pub fn has(&self, key: &str) -> bool {
        self.memory
            .read()
            .map(|cache| cache.contains_key(&normalize_key(key)))
            .unwrap_or(false)
    }

    /// Remove one entry. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.memory
            .write()
            .map(|mut cache| cache.remove(&normalize_key(key)).is_some())
            .unwrap_or(false)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.memory.write() {
            cache.clear();
        }
    }

    /// Evict all expired entries. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        self.clear_expired_at(current_timestamp())
    }

    fn clear_expired_at(&self, now: u64) -> usize {
        let Ok(mut cache) = self.memory.write() else {
            return 0;
        };
        let before = cache.len();
        cache.retain(|_, entry| !self.is_expired(entry, now));
        before - cache.len()
    }

    pub fn stats(&self) -> CacheStats {
        let Ok(cache) = self.memory.read() else {
            return CacheStats::default();
        };
        CacheStats {
            size: cache.len(),
            oldest_entry_timestamp: cache.values().map(|e| e.timestamp).min(),
            newest_entry_timestamp: cache.values().map(|e| e.timestamp).max(),
        }
    }

    pub fn len(&self) -> usize {
        self.memory.read().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.timestamp) >= self.ttl.as_millis() as u64
    }
}

/// Normalize a document identity to its cache key.
pub fn normalize_key(key: &str) -> String {
    let name = key.rsplit(['/', '\\']).next().unwrap_or(key).to_lowercase();
    match name.strip_suffix(".ahk2") {
        Some(stem) => format!("{}.ahk", stem),
        None => name,
    }
}

/// Get current Unix timestamp in milliseconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
