//! The cache tiers backing the [`Loader`](crate::Loader).
//!
//! The loader only talks to a [`CachePort`], a key-value store mapping resource identifiers to
//! their raw bytes. This module provides an in-memory tier, a filesystem tier, and a
//! [`TieredCache`] that layers the two.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::config::Config;

mod cache_key;
mod fs;
mod memory;

pub use cache_key::CacheKey;
pub use fs::FsCache;
pub use memory::InMemoryCache;

/// A key-value store for previously fetched resources.
///
/// Implementations must be safe for concurrent `lookup` and `store` calls. Neither operation
/// may block on the network: `lookup` backs the non-blocking
/// [`load_cached`](crate::Loader::load_cached).
pub trait CachePort: Send + Sync + fmt::Debug {
    /// Returns the bytes stored for `key`, if any.
    fn lookup(&self, key: &str) -> Option<Bytes>;

    /// Stores `value` for `key`, replacing any previous value.
    ///
    /// Failing to store is not an error for the caller; implementations log and move on.
    fn store(&self, key: &str, value: Bytes);
}

impl<C: CachePort + ?Sized> CachePort for Arc<C> {
    fn lookup(&self, key: &str) -> Option<Bytes> {
        (**self).lookup(key)
    }

    fn store(&self, key: &str, value: Bytes) {
        (**self).store(key, value)
    }
}

/// A cache that never holds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl CachePort for NoCache {
    fn lookup(&self, _key: &str) -> Option<Bytes> {
        None
    }

    fn store(&self, _key: &str, _value: Bytes) {}
}

/// Memory first, then filesystem.
///
/// Hits in the filesystem tier are promoted to memory. Stores go to both tiers.
#[derive(Clone, Debug)]
pub struct TieredCache {
    memory: InMemoryCache,
    fs: FsCache,
}

impl TieredCache {
    pub fn new(memory: InMemoryCache, fs: FsCache) -> Self {
        Self { memory, fs }
    }
}

impl CachePort for TieredCache {
    fn lookup(&self, key: &str) -> Option<Bytes> {
        if let Some(bytes) = self.memory.lookup(key) {
            metric!(counter("caches.memory.hit") += 1);
            return Some(bytes);
        }

        let bytes = self.fs.lookup(key)?;
        metric!(counter("caches.file.hit") += 1);
        self.memory.store(key, bytes.clone());
        Some(bytes)
    }

    fn store(&self, key: &str, value: Bytes) {
        metric!(time_raw("caches.file.size") = value.len() as u64);
        self.fs.store(key, value.clone());
        self.memory.store(key, value);
    }
}

/// The cache stack built from a [`Config`].
#[derive(Clone)]
pub struct Caches {
    port: Arc<dyn CachePort>,
}

impl fmt::Debug for Caches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Caches").field(&self.port).finish()
    }
}

impl Caches {
    /// Builds an in-memory cache, layered over a filesystem cache if `cache_dir` is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let memory = InMemoryCache::from_config(&config.caches);
        let port: Arc<dyn CachePort> = match config.cache_dir("resources") {
            Some(dir) => {
                let fs = FsCache::new(dir).context("failed to create cache directory")?;
                Arc::new(TieredCache::new(memory, fs))
            }
            None => Arc::new(memory),
        };
        Ok(Self { port })
    }

    /// The [`CachePort`] handle to give to the loader.
    pub fn port(&self) -> Arc<dyn CachePort> {
        Arc::clone(&self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cache() {
        let cache = NoCache;
        cache.store("a", Bytes::from_static(b"alpha"));
        assert_eq!(cache.lookup("a"), None);
    }

    #[test]
    fn test_tiered_promotes_fs_hits() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FsCache::new(dir.path().to_path_buf()).unwrap();
        fs.store("a", Bytes::from_static(b"alpha"));

        let memory = InMemoryCache::new(1024, None);
        let tiered = TieredCache::new(memory.clone(), fs);

        assert_eq!(memory.lookup("a"), None);
        assert_eq!(tiered.lookup("a"), Some(Bytes::from_static(b"alpha")));
        assert_eq!(memory.lookup("a"), Some(Bytes::from_static(b"alpha")));
    }

    #[test]
    fn test_tiered_stores_both() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FsCache::new(dir.path().to_path_buf()).unwrap();
        let memory = InMemoryCache::new(1024, None);
        let tiered = TieredCache::new(memory.clone(), fs.clone());

        tiered.store("b", Bytes::from_static(b"beta"));
        assert_eq!(memory.lookup("b"), Some(Bytes::from_static(b"beta")));
        assert_eq!(fs.lookup("b"), Some(Bytes::from_static(b"beta")));
    }

    #[test]
    fn test_caches_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let caches = Caches::from_config(&config).unwrap();
        caches.port().store("c", Bytes::from_static(b"gamma"));

        assert!(dir.path().join("resources/tmp").is_dir());
        assert!(dir.path().join("resources/data").is_dir());

        let memory_only = Caches::from_config(&Config::default()).unwrap();
        assert_eq!(memory_only.port().lookup("c"), None);
    }
}
