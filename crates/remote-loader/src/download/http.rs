//! Support to fetch from HTTP(S) servers.

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use reqwest::{Client, StatusCode, header};
use url::Url;

use super::MeasureDownloadGuard;
use crate::error::{LoadError, LoadResult};
use crate::utils::http::DownloadTimeouts;

/// Upper bound for preallocating the response body from `Content-Length`.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Fetcher implementation that supports `http` and `https` URLs.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    timeouts: DownloadTimeouts,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(client: Client, timeouts: DownloadTimeouts, user_agent: String) -> Self {
        Self {
            client,
            timeouts,
            user_agent,
        }
    }

    /// Issues a `GET` request and reads the full response body.
    pub async fn fetch(&self, url: &Url, measure: &MeasureDownloadGuard<'_>) -> LoadResult<Bytes> {
        tracing::debug!("Fetching resource from `{}`", url);

        let request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.user_agent.as_str())
            .send();
        let response = tokio::time::timeout(self.timeouts.head, request)
            .await
            .map_err(|_| LoadError::Timeout(self.timeouts.head))??;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, status));
        }
        tracing::trace!("Success hitting `{url}`");

        let capacity = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
        let mut body = BytesMut::with_capacity(capacity as usize);
        let mut stream = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = stream.try_next().await? {
            measure.add_bytes_transferred(chunk.len() as u64);
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

/// Converts an unsuccessful status code to a [`LoadError`].
fn status_error(url: &Url, status: StatusCode) -> LoadError {
    debug_assert!(!status.is_success());

    if matches!(status, StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED) {
        tracing::debug!("Insufficient permissions to fetch `{url}`: {status}");
        LoadError::PermissionDenied(status.to_string())
    } else if status.is_client_error() {
        // If it's a client error, chances are it's a 404.
        tracing::debug!("Unexpected client error status code from `{url}`: {status}");
        LoadError::NotFound
    } else {
        tracing::debug!("Unexpected status code from `{url}`: {status}");
        LoadError::DownloadError(status.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors() {
        let url: Url = "https://example.com/a.png".parse().unwrap();

        assert_eq!(status_error(&url, StatusCode::NOT_FOUND), LoadError::NotFound);
        assert_eq!(status_error(&url, StatusCode::GONE), LoadError::NotFound);
        assert_eq!(
            status_error(&url, StatusCode::FORBIDDEN),
            LoadError::PermissionDenied("403 Forbidden".into())
        );
        assert_eq!(
            status_error(&url, StatusCode::BAD_GATEWAY),
            LoadError::DownloadError("502 Bad Gateway".into())
        );
    }
}
