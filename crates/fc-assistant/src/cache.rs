//! Bounded LRU response cache with TTL expiry.
//!
//! Shared by the LLM classifier and the conversational responder. Keys are
//! SHA-256 fingerprints of the normalized input, the canonical context and
//! the model identity, so a context or model change never reuses an answer.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use fc_protocol::{CacheStats, Intent};
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::config::IntentConfig;

/// Fixed-length cache key (hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn derive(input: &str, context: &serde_json::Value, model: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_input(input).as_bytes());
        hasher.update([0x1f]);
        hasher.update(canonical_json(context).as_bytes());
        hasher.update([0x1f]);
        hasher.update(model.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trim, case-fold and collapse internal whitespace.
pub fn normalize_input(input: &str) -> String {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// JSON serialization with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// What the cache stores.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Intent(Intent),
    Reply(String),
}

/// Minimal cache interface, injectable for tests.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &Fingerprint) -> Option<CachedValue>;
    fn put(&self, key: Fingerprint, value: CachedValue);
    /// Drop every entry.
    fn clear(&self);
    fn stats(&self) -> CacheStats;
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    inserted_at: Instant,
}

/// LRU cache with a per-entry time-to-live, checked at lookup.
pub struct LruResponseCache {
    entries: Mutex<LruCache<Fingerprint, Entry>>,
    ttl: Duration,
}

impl LruResponseCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &IntentConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_max_size).unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity, config.cache_ttl())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<Fingerprint, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, key: &Fingerprint) -> Option<CachedValue> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            entries.pop(key);
            tracing::debug!(key = key.as_str(), "cache entry expired");
        }
        None
    }

    fn put(&self, key: Fingerprint, value: CachedValue) {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        if let Some((evicted, _)) = self.lock().push(key.clone(), entry)
            && evicted != key
        {
            tracing::debug!(evicted = evicted.as_str(), "cache evicted LRU entry");
        }
    }

    fn clear(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "response cache cleared");
    }

    fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}
