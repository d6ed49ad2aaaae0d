//! Process-lifetime key-value cache.
//!
//! Small concurrent cache injected into components that would otherwise
//! memoize through module-global state. Currently holds discovered model
//! context lengths.

use dashmap::DashMap;

/// Concurrent key-value cache scoped to the process lifetime
pub struct KvCache<V> {
    entries: DashMap<String, V>,
}

impl<V: Clone> KvCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }
}

impl<V: Clone> Default for KvCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let cache: KvCache<u32> = KvCache::new();
        assert_eq!(cache.get("model-a"), None);

        cache.set("model-a", 512);
        assert_eq!(cache.get("model-a"), Some(512));

        cache.set("model-a", 8192);
        assert_eq!(cache.get("model-a"), Some(8192));
    }
}
