//! Support to fetch from the local filesystem via `file://` URLs.

use bytes::Bytes;
use url::Url;

use super::MeasureDownloadGuard;
use crate::error::{LoadError, LoadResult};

/// Fetcher implementation that reads `file://` URLs.
#[derive(Debug, Default)]
pub struct FilesystemFetcher {}

impl FilesystemFetcher {
    pub fn new() -> Self {
        Self {}
    }

    /// Reads the whole file the URL points to.
    pub async fn fetch(&self, url: &Url, measure: &MeasureDownloadGuard<'_>) -> LoadResult<Bytes> {
        let path = url
            .to_file_path()
            .map_err(|_| LoadError::InvalidIdentifier(url.to_string()))?;
        tracing::debug!("Fetching resource from {:?}", path);

        let data = tokio::fs::read(&path).await?;
        measure.add_bytes_transferred(data.len() as u64);
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world\n").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let measure = MeasureDownloadGuard::new("file");
        let data = FilesystemFetcher::new()
            .fetch(&url, &measure)
            .await
            .unwrap();
        assert_eq!(data, Bytes::from_static(b"hello world\n"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("i-do-not-exist")).unwrap();

        let measure = MeasureDownloadGuard::new("file");
        let result = FilesystemFetcher::new().fetch(&url, &measure).await;
        assert_eq!(result, Err(LoadError::NotFound));
    }
}
