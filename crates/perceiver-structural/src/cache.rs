use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use refpilot_core_types::Clock;
use tracing::debug;

use crate::config::CacheConfig;
use crate::metrics;
use crate::model::{Catalog, RefTable};

/// A cache hit: the catalog, the ref table built with it, and how old both are.
#[derive(Clone, Debug)]
pub struct CachedSnapshot {
    pub catalog: Arc<Catalog>,
    pub refs: Arc<RefTable>,
    pub age: Duration,
}

#[derive(Debug)]
struct CacheEntry {
    catalog: Arc<Catalog>,
    refs: Arc<RefTable>,
    stored_at: Instant,
}

/// URL-keyed catalog cache with a TTL and oldest-first eviction.
#[derive(Debug)]
pub struct SnapshotCache {
    entries: DashMap<String, CacheEntry>,
    ttl_ms: AtomicU64,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl SnapshotCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms: AtomicU64::new(duration_to_millis(config.ttl())),
            max_entries: config.max_entries,
            clock,
        }
    }

    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(duration_to_millis(ttl), Ordering::Relaxed);
    }

    /// Returns the entry for `url` if it is younger than the TTL; expired entries are dropped.
    pub fn get(&self, url: &str) -> Option<CachedSnapshot> {
        let ttl = self.current_ttl();
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(url) {
            let age = now.saturating_duration_since(entry.stored_at);
            if age <= ttl {
                return Some(CachedSnapshot {
                    catalog: Arc::clone(&entry.catalog),
                    refs: Arc::clone(&entry.refs),
                    age,
                });
            }
        }
        self.entries.remove(url);
        None
    }

    /// Stores a catalog under `url`. Returns false when nothing was stored.
    pub fn put(&self, url: &str, catalog: Arc<Catalog>, refs: Arc<RefTable>) -> bool {
        if self.max_entries == 0 {
            return false;
        }
        if !self.entries.contains_key(url) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                catalog,
                refs,
                stored_at: self.clock.now(),
            },
        );
        true
    }

    pub fn invalidate(&self, url: &str) -> bool {
        let removed = self.entries.remove(url).is_some();
        if removed {
            metrics::record_invalidation(1);
            debug!(url, "snapshot cache entry invalidated");
        }
        removed
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        metrics::record_invalidation(keys.len());
        keys.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            metrics::record_eviction();
            debug!(url = %key, "evicted oldest snapshot cache entry");
        }
    }

    fn current_ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use refpilot_core_types::{Generation, ManualClock};

    fn catalog(url: &str) -> (Arc<Catalog>, Arc<RefTable>) {
        (
            Arc::new(Catalog::empty(Generation(1), url, "t")),
            Arc::new(RefTable::new(Generation(1))),
        )
    }

    fn cache(max_entries: usize, clock: Arc<ManualClock>) -> SnapshotCache {
        let config = CacheConfig {
            ttl_ms: 1_000,
            max_entries,
            ..CacheConfig::default()
        };
        SnapshotCache::new(&config, clock)
    }

    #[test]
    fn hit_within_ttl_then_miss_after() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(4, clock.clone());
        let (c, r) = catalog("https://a.test/");
        cache.put("https://a.test/", c, r);

        clock.advance(Duration::from_millis(400));
        let hit = cache.get("https://a.test/").expect("fresh entry");
        assert_eq!(hit.age, Duration::from_millis(400));

        clock.advance(Duration::from_millis(601));
        assert!(cache.get("https://a.test/").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_exact_urls() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(4, clock);
        let (c, r) = catalog("https://a.test/?q=1");
        cache.put("https://a.test/?q=1", c, r);
        assert!(cache.get("https://a.test/").is_none());
        assert!(cache.get("https://a.test/?q=1").is_some());
    }

    #[test]
    fn inserting_past_capacity_evicts_only_the_oldest() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(3, clock.clone());
        for url in ["u1", "u2", "u3"] {
            let (c, r) = catalog(url);
            cache.put(url, c, r);
            clock.advance(Duration::from_millis(10));
        }
        // refreshing u1 makes u2 the oldest
        let (c, r) = catalog("u1");
        cache.put("u1", c, r);
        assert_eq!(cache.len(), 3);

        let (c, r) = catalog("u4");
        cache.put("u4", c, r);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("u2"));
        for url in ["u1", "u3", "u4"] {
            assert!(cache.contains(url), "{url} should survive");
        }
    }

    #[test]
    fn invalidation_by_url_and_prefix() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(8, clock);
        for url in ["https://a.test/1", "https://a.test/2", "https://b.test/"] {
            let (c, r) = catalog(url);
            cache.put(url, c, r);
        }
        assert!(cache.invalidate("https://b.test/"));
        assert!(!cache.invalidate("https://b.test/"));
        assert_eq!(cache.invalidate_prefix("https://a.test/"), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(0, clock);
        let (c, r) = catalog("u");
        assert!(!cache.put("u", c, r));
        assert!(cache.get("u").is_none());
    }
}
