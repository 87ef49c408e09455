use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;

use super::{CacheKey, CachePort};

/// A persistent cache tier storing every resource as a file below a cache directory.
///
/// Files are addressed by the [`CacheKey`] of their identifier and written atomically via a
/// temporary file in the `tmp/` subdirectory, so a concurrent reader either sees the complete
/// file or none at all.
///
/// A cache directory must be owned by a single `FsCache` (and its clones) at a time: creating
/// one clears `tmp/`, which would discard files another instance is in the middle of writing.
#[derive(Clone, Debug)]
pub struct FsCache {
    cache_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl FsCache {
    /// Creates the cache, creating `cache_dir` and clearing leftover temporary files.
    ///
    /// Only call this when no other instance is using `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> io::Result<Self> {
        let tmp_dir = cache_dir.join("tmp");
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        Ok(Self { cache_dir, tmp_dir })
    }

    /// The directory this cache writes to.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        let key = CacheKey::from_identifier(key);
        self.cache_dir.join("data").join(key.cache_path())
    }

    fn try_store(&self, cache_path: &Path, value: &[u8]) -> io::Result<()> {
        let mut temp_file = NamedTempFile::new_in(&self.tmp_dir)?;
        io::Write::write_all(&mut temp_file, value)?;
        persist_tempfile(temp_file, cache_path)?;
        Ok(())
    }
}

impl CachePort for FsCache {
    fn lookup(&self, key: &str) -> Option<Bytes> {
        let item_path = self.item_path(key);
        tracing::trace!("Trying fs cache at path {}", item_path.display());

        match fs::read(&item_path) {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::error!(
                    error = &e as &dyn std::error::Error,
                    path = %item_path.display(),
                    "Failed to read cache file",
                );
                None
            }
        }
    }

    fn store(&self, key: &str, value: Bytes) {
        let cache_path = self.item_path(key);
        tracing::trace!("Creating cache file at path {}", cache_path.display());

        if let Err(e) = self.try_store(&cache_path, &value) {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                path = %cache_path.display(),
                "Failed to persist cache file",
            );
        }
    }
}

fn persist_tempfile(mut temp_file: NamedTempFile, cache_path: &Path) -> io::Result<fs::File> {
    let parent = cache_path
        .parent()
        .ok_or_else(|| io::Error::other("no parent directory to persist item"))?;

    // Directories may be removed from under us by external cleanup, so retry the fs operations.
    const MAX_RETRIES: usize = 2;
    let mut retries = 0;
    let file = loop {
        retries += 1;

        if let Err(e) = fs::create_dir_all(parent) {
            tracing::error!(path = %parent.display(), "Failed to create cache directory: {:?}", e);
            if retries > MAX_RETRIES {
                return Err(e);
            }
            continue;
        }

        match temp_file.persist(cache_path) {
            Ok(file) => break file,
            Err(e) => {
                temp_file = e.file;
                let err = e.error;
                tracing::error!(path = %cache_path.display(), "Failed to create cache file: {:?}", err);
                if retries > MAX_RETRIES {
                    return Err(err);
                }
                continue;
            }
        }
    };
    Ok(file)
}
