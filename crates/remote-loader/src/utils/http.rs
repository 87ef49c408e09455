use std::time::Duration;

use crate::config::Config;

/// Various timeouts for all the fetchers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DownloadTimeouts {
    /// The timeout for establishing a connection.
    pub connect: Duration,
    /// The timeout for receiving the response headers.
    pub head: Duration,
    /// Global timeout for one fetch, including the body.
    pub max_download: Duration,
}

impl DownloadTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect: config.connect_timeout,
            head: config.head_timeout,
            max_download: config.max_download_timeout,
        }
    }
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Creates a [`reqwest::Client`] with the provided connect timeout.
///
/// The head and overall timeouts are applied per fetch, so that they surface as
/// [`LoadError::Timeout`](crate::LoadError::Timeout). Responses are transparently decompressed,
/// and idle connections are kept in the pool for a short while so that fetches from the same
/// host can reuse them.
pub fn create_client(timeouts: &DownloadTimeouts) -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .connect_timeout(timeouts.connect)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}
