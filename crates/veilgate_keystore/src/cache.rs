//! Bounded cache of loaded keys.

use std::collections::{HashMap, VecDeque};

/// How many loaded keys a store keeps in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheSize {
    /// Keep every key that was loaded.
    #[default]
    Unlimited,
    /// Read keys from disk on every lookup.
    Disabled,
    /// Keep at most this many keys, evicting the least recently used.
    Bounded(usize),
}

/// Least-recently-used map keyed by key file name.
#[derive(Debug)]
pub(crate) struct KeyCache<V> {
    size: CacheSize,
    entries: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V: Clone> KeyCache<V> {
    pub(crate) fn new(size: CacheSize) -> Self {
        Self {
            size,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&mut self, name: &str) -> Option<V> {
        let value = self.entries.get(name)?.clone();
        self.touch(name);
        Some(value)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: String, value: V) {
        let capacity = match self.size {
            CacheSize::Disabled | CacheSize::Bounded(0) => return,
            CacheSize::Unlimited => usize::MAX,
            CacheSize::Bounded(n) => n,
        };

        if self.entries.insert(name.clone(), value).is_some() {
            self.touch(&name);
            return;
        }
        self.order.push_back(name);

        while self.entries.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, name: &str) {
        if let Some(pos) = self.order.iter().position(|n| n == name) {
            if let Some(entry) = self.order.remove(pos) {
                self.order.push_back(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_keeps_nothing() {
        let mut cache = KeyCache::new(CacheSize::Disabled);
        cache.insert("a".into(), 1);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn unlimited_keeps_everything() {
        let mut cache = KeyCache::new(CacheSize::Unlimited);
        for i in 0..100 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get("k0"), Some(0));
    }

    #[test]
    fn bounded_evicts_least_recently_used() {
        let mut cache = KeyCache::new(CacheSize::Bounded(2));
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c".into(), 3);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_replaces_value() {
        let mut cache = KeyCache::new(CacheSize::Bounded(2));
        cache.insert("a".into(), 1);
        cache.insert("a".into(), 5);
        assert_eq!(cache.get("a"), Some(5));
        assert_eq!(cache.len(), 1);
    }
}
