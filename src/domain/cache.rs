//! Bounded least-recently-used map.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Map that evicts its least recently used entry once full.
///
/// Recency is tracked with a monotonically increasing tick stored next to
/// each value and mirrored in an ordered tick index, so the oldest entry is
/// always the first one in `order`.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates a cache holding at most `capacity` entries. Zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(4096)),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let tick = self.next_tick();
        let (value, used) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(used, tick);
        if let Some(owned) = self.order.remove(&previous) {
            self.order.insert(tick, owned);
        }
        Some(&*value)
    }

    /// Inserts an entry, returning the key that was evicted to make room.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        let tick = self.next_tick();
        let mut evicted = None;
        if let Some((_, used)) = self.entries.get(&key) {
            self.order.remove(used);
        } else if self.entries.len() >= self.capacity {
            evicted = self.evict_lru();
        }
        self.order.insert(tick, key.clone());
        self.entries.insert(key, (value, tick));
        evicted
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.tick = 0;
    }

    fn evict_lru(&mut self) -> Option<K> {
        let (_, oldest) = self.order.pop_first()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get("a"), Some(&1));

        let evicted = cache.put("c".to_string(), 3);
        assert_eq!(evicted.as_deref(), Some("b"));
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_replacing_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.put(1, "one");
        cache.put(2, "two");
        assert_eq!(cache.put(1, "uno"), None);
        assert_eq!(cache.get(&1), Some(&"uno"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, 1);
        assert_eq!(cache.put(2, 2), Some(1));
        assert_eq!(cache.get(&2), Some(&2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sequential_scan_larger_than_capacity() {
        let mut cache = LruCache::new(3);
        let mut evicted = Vec::new();
        for pass in 0..2 {
            for key in 0..5 {
                if cache.get(&key).is_none() {
                    evicted.extend(cache.put(key, pass));
                }
            }
        }
        // every lookup misses once the working set exceeds the capacity
        assert_eq!(evicted, vec![0, 1, 2, 3, 4, 0, 1]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.order.len(), 3);
        assert!(cache.contains_key(&2) && cache.contains_key(&3) && cache.contains_key(&4));
    }
}
