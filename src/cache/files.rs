//! LRU cache of fetched resource bytes
//!
//! Keeps external buffers and images around between loads so that reloading
//! an asset, or loading several assets that share a `.bin`, does not hit the
//! fetcher again.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use xxhash_rust::xxh3::Xxh3;

/// A cached payload with metadata
struct CachedBytes {
    bytes: Arc<[u8]>,
    size: usize,
    #[allow(dead_code)]
    last_accessed: u64,
}

/// Fetched bytes keyed by URL, evicted least-recently-used first
#[derive(Clone)]
pub struct FileCache {
    entries: Arc<RwLock<HashMap<u64, CachedBytes>>>,
    lru: Arc<RwLock<VecDeque<u64>>>,
    max_memory: usize,
    current_memory: Arc<AtomicUsize>,
}

impl FileCache {
    /// Creates a cache holding at most `max_memory` bytes
    pub fn new(max_memory: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            lru: Arc::new(RwLock::new(VecDeque::new())),
            max_memory,
            current_memory: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Look up the bytes for `url`, marking them most recently used
    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        let key = Self::hash_url(url);
        let bytes = self.entries.read().get(&key).map(|c| Arc::clone(&c.bytes))?;

        let mut lru = self.lru.write();
        if let Some(pos) = lru.iter().position(|&id| id == key) {
            lru.remove(pos);
        }
        lru.push_back(key);
        Some(bytes)
    }

    /// Store bytes for `url`; payloads larger than the whole cache are skipped
    pub fn insert(&self, url: &str, bytes: Arc<[u8]>) {
        let size = bytes.len();
        if size > self.max_memory {
            log::debug!("Not caching {url}: {size} bytes exceeds cache capacity");
            return;
        }

        let key = Self::hash_url(url);
        self.remove_key(key);
        self.evict_if_needed(size);

        let cached = CachedBytes {
            bytes,
            size,
            last_accessed: Self::current_timestamp(),
        };
        self.entries.write().insert(key, cached);
        self.lru.write().push_back(key);
        self.current_memory.fetch_add(size, Ordering::SeqCst);
    }

    /// Clears all cached payloads
    pub fn clear(&self) {
        self.entries.write().clear();
        self.lru.write().clear();
        self.current_memory.store(0, Ordering::SeqCst);
    }

    /// Gets the current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.current_memory.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn remove_key(&self, key: u64) {
        if let Some(removed) = self.entries.write().remove(&key) {
            self.current_memory.fetch_sub(removed.size, Ordering::SeqCst);
            let mut lru = self.lru.write();
            if let Some(pos) = lru.iter().position(|&id| id == key) {
                lru.remove(pos);
            }
        }
    }

    fn evict_if_needed(&self, required_size: usize) {
        let mut entries = self.entries.write();
        let mut lru = self.lru.write();
        let mut current_memory = self.current_memory.load(Ordering::SeqCst);

        while current_memory + required_size > self.max_memory {
            let Some(oldest) = lru.pop_front() else {
                break;
            };
            if let Some(removed) = entries.remove(&oldest) {
                current_memory -= removed.size;
            }
        }

        self.current_memory.store(current_memory, Ordering::SeqCst);
    }

    fn hash_url(url: &str) -> u64 {
        let mut hasher = Xxh3::new();
        url.hash(&mut hasher);
        hasher.finish()
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("entries", &self.len())
            .field("memory_usage", &self.memory_usage())
            .field("max_memory", &self.max_memory)
            .finish()
    }
}
