use std::fmt::{self, Write};

use sha2::{Digest, Sha256};

/// A stable, filesystem-safe key derived from a resource identifier.
///
/// Identifiers are arbitrary URLs, so they are hashed with SHA-256 before they are
/// turned into a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: [u8; 32],
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_path())
    }
}

impl CacheKey {
    /// Creates the [`CacheKey`] for the given identifier.
    pub fn from_identifier(identifier: &str) -> Self {
        let hash = Sha256::digest(identifier.as_bytes());
        Self { hash: hash.into() }
    }

    /// Returns the relative path for this cache key.
    ///
    /// The relative path is a sha-256 hash hex-formatted like so:
    /// `aa/bbccdd/eeff...`
    pub fn cache_path(&self) -> String {
        let mut path = format!("{:02x}/", self.hash[0]);
        for b in &self.hash[1..4] {
            let _ = write!(path, "{b:02x}");
        }
        path.push('/');
        for b in &self.hash[4..] {
            let _ = write!(path, "{b:02x}");
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_layout() {
        let key = CacheKey::from_identifier("https://example.com/a.png");
        let path = key.cache_path();

        let segments: Vec<_> = path.split('/').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[1].len(), 6);
        assert_eq!(segments[2].len(), 56);
        assert!(path.chars().all(|c| c == '/' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_stable_and_distinct() {
        let a = CacheKey::from_identifier("https://example.com/a.png");
        let b = CacheKey::from_identifier("https://example.com/b.png");
        assert_eq!(a, CacheKey::from_identifier("https://example.com/a.png"));
        assert_ne!(a, b);
        assert_ne!(a.cache_path(), b.cache_path());
    }
}
