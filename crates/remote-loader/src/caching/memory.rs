use std::time::Duration;

use bytes::Bytes;

use super::CachePort;
use crate::config::CacheConfigs;

/// A bounded in-memory cache tier.
///
/// Items are weighted by their byte length, and evicted when either the configured capacity is
/// exceeded or they have not been accessed for the configured time-to-idle.
#[derive(Clone, Debug)]
pub struct InMemoryCache {
    cache: moka::sync::Cache<String, Bytes>,
}

impl InMemoryCache {
    pub fn new(capacity: u64, time_to_idle: Option<Duration>) -> Self {
        let mut builder = moka::sync::Cache::builder()
            .max_capacity(capacity)
            .name("in-memory")
            // NOTE: we count the key to the weight as well
            .weigher(|k: &String, v: &Bytes| {
                let size = k.len().saturating_add(v.len());
                u32::try_from(size).unwrap_or(u32::MAX)
            });
        if let Some(tti) = time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub fn from_config(config: &CacheConfigs) -> Self {
        Self::new(config.in_memory_capacity, config.in_memory_ttl)
    }

    /// The approximate number of items held in memory.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl CachePort for InMemoryCache {
    fn lookup(&self, key: &str) -> Option<Bytes> {
        self.cache.get(key)
    }

    fn store(&self, key: &str, value: Bytes) {
        self.cache.insert(key.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_store() {
        let cache = InMemoryCache::new(1024, None);
        assert_eq!(cache.lookup("a"), None);

        cache.store("a", Bytes::from_static(b"alpha"));
        assert_eq!(cache.lookup("a"), Some(Bytes::from_static(b"alpha")));
        assert_eq!(cache.lookup("b"), None);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = InMemoryCache::new(64, None);
        for i in 0..32 {
            cache.store(&format!("key-{i}"), Bytes::from(vec![0u8; 16]));
        }
        // every item weighs more than 16 bytes, so at most 3 of them fit
        assert!(cache.entry_count() <= 3);
    }
}
