//! The cache-or-fetch policy tying all the pieces together.

use std::fmt;
use std::sync::Arc;

use crate::caching::CachePort;
use crate::coalesce::RequestCoalescer;
use crate::decode::Decoder;
use crate::download::Fetcher;
use crate::error::{LoadError, LoadResult};
use crate::gate::FetchGate;

/// Loads and decodes remote resources, backed by a cache.
///
/// For every identifier, the loader:
///
/// 1. serializes with concurrent loads of the same identifier (see [`RequestCoalescer`]),
/// 2. returns the decoded cache contents if the [`CachePort`] has the resource,
/// 3. otherwise waits for a [`FetchGate`] slot, fetches the resource, stores the raw bytes in
///    the cache and returns them decoded.
///
/// Because the first of several concurrent callers populates the cache before the others get
/// their turn, a resource is fetched over the network only once no matter how many callers ask
/// for it at the same time.
///
/// The loader is meant to be created once and shared, e.g. behind an [`Arc`].
pub struct Loader<D> {
    coalescer: RequestCoalescer,
    gate: FetchGate,
    cache: Arc<dyn CachePort>,
    fetcher: Arc<dyn Fetcher>,
    decoder: D,
}

impl<D> fmt::Debug for Loader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("pending", &self.coalescer.pending())
            .field("in_flight", &self.gate.in_flight())
            .field("max_concurrent_fetches", &self.gate.capacity())
            .field("cache", &self.cache)
            .finish()
    }
}

impl<D: Decoder> Loader<D> {
    /// Creates a loader allowing at most `max_concurrent_fetches` fetches at the same time.
    pub fn new(
        cache: Arc<dyn CachePort>,
        fetcher: Arc<dyn Fetcher>,
        decoder: D,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self::with_shared(
            RequestCoalescer::new(),
            FetchGate::new(max_concurrent_fetches),
            cache,
            fetcher,
            decoder,
        )
    }

    /// Creates a loader on top of an existing coalescer and gate.
    ///
    /// Loaders sharing a coalescer and a gate never fetch the same identifier concurrently and
    /// together stay within the gate's capacity, regardless of their decoders.
    pub fn with_shared(
        coalescer: RequestCoalescer,
        gate: FetchGate,
        cache: Arc<dyn CachePort>,
        fetcher: Arc<dyn Fetcher>,
        decoder: D,
    ) -> Self {
        Self {
            coalescer,
            gate,
            cache,
            fetcher,
            decoder,
        }
    }

    /// The gate bounding concurrent fetches of this loader.
    pub fn gate(&self) -> &FetchGate {
        &self.gate
    }

    /// The coalescer serializing loads of the same identifier.
    pub fn coalescer(&self) -> &RequestCoalescer {
        &self.coalescer
    }

    /// Loads the resource, returning `None` if it is not available.
    ///
    /// Fetch and decode failures are logged and reported as `None`. Use
    /// [`try_load`](Self::try_load) to find out why a resource is unavailable.
    pub async fn load(&self, identifier: &str) -> Option<D::Output> {
        match self.try_load(identifier).await {
            Ok(output) => Some(output),
            Err(LoadError::InternalError) => {
                tracing::error!(identifier, "Loading resource failed internally");
                None
            }
            Err(error) => {
                tracing::debug!(
                    identifier,
                    error = &error as &dyn std::error::Error,
                    "Resource not available"
                );
                None
            }
        }
    }

    /// Loads the resource, reporting why it is not available.
    pub async fn try_load(&self, identifier: &str) -> LoadResult<D::Output> {
        metric!(counter("loader.access") += 1);

        let result = self
            .coalescer
            .coalesce(identifier, || self.lookup_or_fetch(identifier))
            .await;

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.metrics_tag(),
        };
        metric!(counter("loader.result") += 1, "status" => status);

        result
    }

    /// Returns the resource only if it is already cached.
    ///
    /// This never touches the network and never waits for other loads, which makes it suitable
    /// for an immediate first look before [`load`](Self::load) completes. A fetch running
    /// concurrently for the same identifier may or may not be visible.
    pub fn load_cached(&self, identifier: &str) -> Option<D::Output> {
        let bytes = self.cache.lookup(identifier)?;
        match self.decoder.decode(bytes) {
            Ok(output) => Some(output),
            Err(error) => {
                tracing::debug!(
                    identifier,
                    error = &error as &dyn std::error::Error,
                    "Cached resource could not be decoded"
                );
                None
            }
        }
    }

    /// The unit of work run under the coalescing slot of `identifier`.
    async fn lookup_or_fetch(&self, identifier: &str) -> LoadResult<D::Output> {
        if let Some(bytes) = self.cache.lookup(identifier) {
            metric!(counter("loader.cache.hit") += 1);
            tracing::trace!(identifier, "Serving resource from cache");
            return self.decoder.decode(bytes);
        }
        metric!(counter("loader.cache.miss") += 1);

        let _permit = self.gate.acquire().await?;

        let bytes = self.fetcher.fetch(identifier).await?;
        self.cache.store(identifier, bytes.clone());

        self.decoder.decode(bytes)
    }
}
