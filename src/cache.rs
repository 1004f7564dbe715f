//! Profile caching keyed by a content fingerprint.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{config::ProfileConfig, profile::TableProfile, sources::SourceOptions};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// SHA-256 over the source bytes and every setting that changes the profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn fingerprint(bytes: &[u8], options: &SourceOptions, config: &ProfileConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(format!("{options:?}").as_bytes());
        hasher.update(serde_json::to_string(config).unwrap_or_default().as_bytes());
        CacheKey(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ProfileCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<TableProfile>;

    fn put(&self, key: CacheKey, profile: TableProfile);
}

struct Entry {
    profile: TableProfile,
    expires_at: Instant,
    sequence: u64,
}

/// In-process cache with a time-to-live and a bounded entry count. When full,
/// the entry closest to expiry is evicted.
pub struct MemoryCache {
    ttl: Duration,
    capacity: usize,
    sequence: AtomicU64,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            sequence: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProfileCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<TableProfile> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!("Profile cache hit for {key}");
                Some(entry.profile.clone())
            }
            Some(_) => {
                debug!("Profile cache entry {key} expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: CacheKey, profile: TableProfile) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() >= self.capacity
            && !entries.contains_key(&key)
            && let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| (entry.expires_at, entry.sequence))
                .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest);
        }
        entries.insert(
            key,
            Entry {
                profile,
                expires_at: now + self.ttl,
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            },
        );
    }
}
