use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks decode and cache activity for one load
#[derive(Debug, Default)]
pub struct ResolveMetrics {
    decode_counts: RwLock<HashMap<&'static str, u64>>,
    fetch_times: RwLock<HashMap<String, Duration>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    primitive_hits: AtomicU64,
    bytes_fetched: AtomicU64,
}

impl ResolveMetrics {
    /// Create a new instance of ResolveMetrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a decode of `kind` actually ran
    pub fn record_decode(&self, kind: &'static str) {
        let mut counts = self.decode_counts.write();
        *counts.entry(kind).or_insert(0) += 1;
    }

    /// Record a dependency cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dependency cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a primitive geometry reused from the primitive cache
    pub fn record_primitive_hit(&self) {
        self.primitive_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed fetch
    pub fn record_fetch(&self, uri: String, bytes: usize, duration: Duration) {
        self.bytes_fetched.fetch_add(bytes as u64, Ordering::Relaxed);
        self.fetch_times.write().insert(uri, duration);
    }

    /// How many times a decode of `kind` ran
    pub fn decode_count(&self, kind: &str) -> u64 {
        *self.decode_counts.read().get(kind).unwrap_or(&0)
    }

    /// Total decodes over every kind
    pub fn total_decodes(&self) -> u64 {
        self.decode_counts.read().values().sum()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn primitive_hits(&self) -> u64 {
        self.primitive_hits.load(Ordering::Relaxed)
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits() as f32;
        let misses = self.cache_misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Bytes pulled through the fetcher
    pub fn total_bytes_fetched(&self) -> u64 {
        self.bytes_fetched.load(Ordering::Relaxed)
    }

    /// Time spent fetching `uri`, if it was fetched
    pub fn fetch_time(&self, uri: &str) -> Option<Duration> {
        self.fetch_times.read().get(uri).cloned()
    }
}

/// A thread-safe wrapper around ResolveMetrics
#[derive(Debug, Clone, Default)]
pub struct ResolveMetricsHandle(Arc<ResolveMetrics>);

impl ResolveMetricsHandle {
    /// Create a new metrics handle
    pub fn new() -> Self {
        Self(Arc::new(ResolveMetrics::new()))
    }

    /// Get a reference to the underlying metrics
    pub fn inner(&self) -> &ResolveMetrics {
        &self.0
    }
}

impl std::ops::Deref for ResolveMetricsHandle {
    type Target = ResolveMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_counts() {
        let metrics = ResolveMetricsHandle::new();
        metrics.record_decode("mesh");
        metrics.record_decode("mesh");
        metrics.record_decode("node");
        assert_eq!(metrics.decode_count("mesh"), 2);
        assert_eq!(metrics.decode_count("skin"), 0);
        assert_eq!(metrics.total_decodes(), 3);
    }

    #[test]
    fn test_hit_rate() {
        let metrics = ResolveMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert_eq!(metrics.cache_hit_rate(), 50.0);
    }
}
