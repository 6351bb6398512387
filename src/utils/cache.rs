use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 報表查詢結果的行程內 TTL 快取
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    store: Arc<DashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let hit = self
            .store
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        match hit {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.store.remove_if(key, |_, entry| entry.expires_at <= now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.store.contains_key(&key) && self.store.len() >= self.max_entries {
            self.cleanup_expired();
            if self.store.len() >= self.max_entries {
                self.evict_soonest();
            }
        }

        self.store.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn evict_soonest(&self) {
        let victim = self
            .store
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.store.remove(&key);
        }
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.store.remove(key).is_some()
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| entry.expires_at > now);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss_counting() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 10);
        assert!(cache.get(&"a".to_string()).is_none());
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entries_expire() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_millis(10), 10);
        cache.insert("k", 7);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&"k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_evicts_oldest_entry() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1, 10);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(2, 20);
        cache.insert(3, 30);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn test_invalidate() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 4);
        cache.insert(1, 1);
        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));
    }
}
