//! Wires up the loader services from a [`Config`].
//!
//! [`LoaderServices`] creates the cache tiers, the download service, the fetch gate and the
//! request coalescer once. Loaders for any number of decoders can then be created from it, and
//! all of them share that state.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::caching::Caches;
use crate::coalesce::RequestCoalescer;
use crate::config::Config;
use crate::decode::Decoder;
use crate::download::DownloadService;
use crate::gate::FetchGate;
use crate::loader::Loader;

#[derive(Debug)]
pub struct LoaderServices {
    pub config: Config,
    pub caches: Caches,
    pub download_svc: Arc<DownloadService>,
    pub gate: FetchGate,
    pub coalescer: RequestCoalescer,
}

impl LoaderServices {
    pub fn new(config: Config) -> Result<Self> {
        if let Some(ref statsd) = config.metrics.statsd {
            crate::metrics::configure_statsd(
                &config.metrics.prefix,
                statsd.as_str(),
                config.metrics.custom_tags.clone(),
            )
            .context("failed to configure metrics")?;
        }

        let caches = Caches::from_config(&config).context("failed to create local caches")?;
        let download_svc =
            DownloadService::new(&config).context("failed to create download service")?;
        let gate = FetchGate::new(config.max_concurrent_fetches);

        Ok(Self {
            config,
            caches,
            download_svc,
            gate,
            coalescer: RequestCoalescer::new(),
        })
    }

    /// Creates a loader decoding resources with `decoder`.
    ///
    /// All loaders created here share one fetch gate, so together they run at most
    /// [`max_concurrent_fetches`](Config::max_concurrent_fetches) fetches.
    pub fn loader<D: Decoder>(&self, decoder: D) -> Loader<D> {
        Loader::with_shared(
            self.coalescer.clone(),
            self.gate.clone(),
            self.caches.port(),
            self.download_svc.clone(),
            decoder,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::decode::{RawDecoder, SniffDecoder};

    #[tokio::test]
    async fn test_loads_files_through_services() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let config = Config {
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        let services = LoaderServices::new(config).unwrap();
        let loader = services.loader(RawDecoder);

        let url = url::Url::from_file_path(&path).unwrap();
        let loaded = loader.load(url.as_str()).await;
        assert_eq!(loaded, Some(Bytes::from_static(b"hello")));

        // the fs tier persisted the resource; a cache dir has a single owner at a time
        std::fs::remove_file(&path).unwrap();
        let config = services.config.clone();
        drop((loader, services));
        let reopened = LoaderServices::new(config).unwrap();
        let loader = reopened.loader(RawDecoder);
        assert_eq!(loader.load_cached(url.as_str()), Some(Bytes::from_static(b"hello")));
    }

    #[tokio::test]
    async fn test_loaders_share_gate_and_coalescer() {
        tokio::time::pause();
        let config = Config {
            max_concurrent_fetches: 1,
            ..Config::default()
        };
        let services = LoaderServices::new(config).unwrap();
        let raw = services.loader(RawDecoder);
        let sniff = services.loader(SniffDecoder);

        let permit = raw.gate().acquire().await.unwrap();
        assert_eq!(sniff.gate().in_flight(), 1);

        let second = tokio::time::timeout(Duration::from_millis(50), sniff.gate().acquire()).await;
        assert!(second.is_err(), "second loader exceeded the shared bound");

        drop(permit);
        let _permit = sniff.gate().acquire().await.unwrap();
        assert_eq!(raw.gate().in_flight(), 1);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let holder = raw.coalescer().coalesce("shared", || async move {
            rx.await.ok();
        });
        let observer = async {
            tokio::task::yield_now().await;
            let pending = sniff.coalescer().pending();
            tx.send(()).ok();
            pending
        };
        let ((), pending) = tokio::join!(holder, observer);
        assert_eq!(pending, 1);
        assert_eq!(raw.coalescer().pending(), 0);
    }
}
