use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// An error that happens while loading a remote resource.
///
/// The [`Loader`](crate::Loader) never hands these out through
/// [`load`](crate::Loader::load), which turns them into an absent result. They
/// are available through [`try_load`](crate::Loader::try_load) for callers that
/// want to know why a resource is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The resource was not found at the remote location.
    #[error("not found")]
    NotFound,
    /// The resource could not be fetched due to missing permissions.
    ///
    /// The attached string contains the remote server's response status.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The resource could not be fetched due to a timeout.
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
    /// The resource could not be fetched due to another problem,
    /// like connection loss, DNS resolution, or a 5xx server response.
    #[error("download failed: {0}")]
    DownloadError(String),
    /// The identifier is not an URL that any fetcher can handle.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// The resource was fetched successfully, but could not be decoded.
    #[error("malformed: {0}")]
    Malformed(String),
    /// An unexpected error in the loader itself.
    #[error("internal error")]
    InternalError,
}

impl LoadError {
    /// A stable name of the error kind, used to tag metrics.
    pub fn metrics_tag(&self) -> &'static str {
        match self {
            LoadError::NotFound => "notfound",
            LoadError::PermissionDenied(_) => "permissiondenied",
            LoadError::Timeout(_) => "timeout",
            LoadError::DownloadError(_) => "downloaderror",
            LoadError::InvalidIdentifier(_) => "invalididentifier",
            LoadError::Malformed(_) => "malformed",
            LoadError::InternalError => "internalerror",
        }
    }

    /// Creates a [`DownloadError`](Self::DownloadError) from the innermost cause of `error`.
    pub(crate) fn download_error(mut error: &dyn Error) -> Self {
        while let Some(src) = error.source() {
            error = src;
        }

        let mut error_string = error.to_string();

        // Special-case a few error strings
        if error_string.contains("certificate verify failed") {
            error_string = "certificate verify failed".to_string();
        }

        if error_string.contains("SSL routines") {
            error_string = "SSL error".to_string();
        }

        Self::DownloadError(error_string)
    }

    #[track_caller]
    pub fn from_std_error<E: Error + 'static>(e: E) -> Self {
        let dynerr: &dyn Error = &e; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr);
        Self::InternalError
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // Only the connect timeout is enforced by the client itself.
            return Self::DownloadError("request timed out".into());
        }
        Self::download_error(&error)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(error.to_string()),
            _ => Self::download_error(&error),
        }
    }
}

/// The outcome of a fallible load step.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(LoadError::from(err), LoadError::NotFound);

        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(
            LoadError::from(err),
            LoadError::DownloadError("reset by peer".into())
        );
    }

    #[test]
    fn test_download_error_innermost() {
        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] std::io::Error);

        let inner = std::io::Error::other("SSL routines:tls_process_server_certificate");
        let err = LoadError::download_error(&Outer(inner));
        assert_eq!(err, LoadError::DownloadError("SSL error".into()));
    }

    #[test]
    fn test_metrics_tags() {
        assert_eq!(LoadError::NotFound.metrics_tag(), "notfound");
        assert_eq!(
            LoadError::Timeout(Duration::from_secs(1)).metrics_tag(),
            "timeout"
        );
        assert_eq!(
            LoadError::Malformed("bad".into()).metrics_tag(),
            "malformed"
        );
    }
}
