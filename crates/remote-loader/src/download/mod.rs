//! Service which fetches the raw bytes of remote resources.
//!
//! The resource identifier is parsed as an URL and dispatched on its scheme: `http` and
//! `https` go to the [`HttpFetcher`], `file` to the [`FilesystemFetcher`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::config::Config;
use crate::error::{LoadError, LoadResult};
use crate::utils::http::{DownloadTimeouts, create_client};

mod filesystem;
mod http;

pub use filesystem::FilesystemFetcher;
pub use http::HttpFetcher;

/// Produces the full raw bytes of a resource.
///
/// Implementations report every failure as a [`LoadError`]; they never retry.
pub trait Fetcher: Send + Sync {
    /// Fetches the resource named by `identifier`.
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, LoadResult<Bytes>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, LoadResult<Bytes>> {
        (**self).fetch(identifier)
    }
}

/// A [`Fetcher`] dispatching to the fetcher responsible for the identifier's URL scheme.
#[derive(Debug)]
pub struct DownloadService {
    timeouts: DownloadTimeouts,
    http: HttpFetcher,
    fs: FilesystemFetcher,
}

impl DownloadService {
    /// Creates a new download service from the configured timeouts and user agent.
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        let timeouts = DownloadTimeouts::from_config(config);
        let client = create_client(&timeouts).context("failed to create http client")?;

        Ok(Arc::new(Self {
            timeouts,
            http: HttpFetcher::new(client, timeouts, config.user_agent.clone()),
            fs: FilesystemFetcher::new(),
        }))
    }

    /// Fetches the resource, bounded by the overall download timeout.
    ///
    /// This does not do any deduplication of requests, every call fetches afresh.
    pub async fn download(&self, identifier: &str) -> LoadResult<Bytes> {
        let url = Url::parse(identifier)
            .map_err(|e| LoadError::InvalidIdentifier(format!("{identifier}: {e}")))?;
        let scheme = url.scheme().to_owned();

        let measure = MeasureDownloadGuard::new(&scheme);
        let job = async {
            match scheme.as_str() {
                "http" | "https" => self.http.fetch(&url, &measure).await,
                "file" => self.fs.fetch(&url, &measure).await,
                _ => Err(LoadError::InvalidIdentifier(format!(
                    "unsupported scheme `{scheme}`"
                ))),
            }
        };

        let timeout = self.timeouts.max_download;
        let result = match tokio::time::timeout(timeout, job).await {
            Ok(result) => result,
            Err(_) => Err(LoadError::Timeout(timeout)),
        };

        match &result {
            Ok(_) => {
                tracing::debug!("Resource `{}` fetched successfully", url);
            }
            Err(err) => {
                metric!(counter("download.failure") += 1, "scheme" => &scheme, "status" => err.metrics_tag());
                tracing::debug!("Resource `{}` fetching failed: {}", url, err);
            }
        }
        measure.done(&result);

        result
    }
}

impl Fetcher for DownloadService {
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, LoadResult<Bytes>> {
        Box::pin(self.download(identifier))
    }
}

/// State of the [`MeasureDownloadGuard`].
#[derive(Clone, Copy, Debug)]
enum MeasureState {
    /// The download has not finished.
    Pending,
    /// The download has terminated with a status.
    Done(&'static str),
}

/// A guard to measure the amount of time and bytes it takes to fetch a resource.
///
/// The metrics are emitted on drop, so a fetch whose future is dropped early is reported as
/// `canceled`.
pub struct MeasureDownloadGuard<'a> {
    state: MeasureState,
    scheme: &'a str,
    creation_time: Instant,
    bytes_transferred: AtomicU64,
}

impl<'a> MeasureDownloadGuard<'a> {
    pub fn new(scheme: &'a str) -> Self {
        Self {
            state: MeasureState::Pending,
            scheme,
            creation_time: Instant::now(),
            bytes_transferred: AtomicU64::new(0),
        }
    }

    /// Records bytes received so far.
    pub fn add_bytes_transferred(&self, additional_bytes: u64) {
        self.bytes_transferred
            .fetch_add(additional_bytes, Ordering::Relaxed);
    }

    /// Marks the download as terminated.
    pub fn done<T>(mut self, result: &LoadResult<T>) {
        self.state = MeasureState::Done(match result {
            Ok(_) => "ok",
            Err(e) => e.metrics_tag(),
        });
    }
}

impl Drop for MeasureDownloadGuard<'_> {
    fn drop(&mut self) {
        let status = match self.state {
            MeasureState::Pending => "canceled",
            MeasureState::Done(status) => status,
        };

        metric!(
            timer("download.duration") = self.creation_time.elapsed(),
            "scheme" => self.scheme,
            "status" => status,
        );

        let bytes_transferred = *self.bytes_transferred.get_mut();
        if bytes_transferred > 0 {
            metric!(
                histogram("download.size") = bytes_transferred,
                "scheme" => self.scheme,
                "status" => status,
            );
        }
    }
}
