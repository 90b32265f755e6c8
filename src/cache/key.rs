//! Cache Key
//!
//! Reference-URL normalization. Tokens and other per-request values usually
//! travel in the query string, so the key keeps scheme, host, port, path and
//! fragment but drops the query.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use url::Url;

use crate::error::FetchError;

/// Normalized request URL identifying an image across both tiers
#[derive(Clone, Debug, Eq)]
pub struct CacheKey {
    /// Precomputed FxHash of `url`
    hash: u64,
    /// Query-stripped URL
    url: Arc<str>,
}

impl CacheKey {
    /// Build the key for a parsed request URL
    pub fn from_url(url: &Url) -> Self {
        let mut reference = url.clone();
        reference.set_query(None);
        Self::from_normalized(reference.as_str())
    }

    /// Parse and normalize a raw request URL.
    ///
    /// Rejects empty input, unparsable URLs and URLs without a host.
    pub fn parse(raw: &str) -> Result<(Url, Self), FetchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FetchError::InvalidRequestData("missing URL".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| FetchError::InvalidRequestData(format!("{}: {}", raw, e)))?;
        // `file:///x` has an empty host
        if url.host_str().map_or(true, str::is_empty) {
            return Err(FetchError::InvalidRequestData(format!(
                "{}: URL has no host",
                raw
            )));
        }

        let key = Self::from_url(&url);
        Ok((url, key))
    }

    /// Rebuild a key from an already-normalized string (e.g. a persisted record)
    pub fn from_normalized(url: &str) -> Self {
        Self {
            hash: fx_hash(url.as_bytes()),
            url: Arc::from(url),
        }
    }

    /// Normalized URL string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Shard index for this key (`shard_count` must be a power of two)
    #[inline]
    pub fn shard_index(&self, shard_count: usize) -> usize {
        // High bits of the multiplicative hash are the best mixed
        ((self.hash >> 40) as usize) & (shard_count - 1)
    }

    /// Stable file-name stem; identical across processes and platforms
    pub fn file_stem(&self) -> String {
        format!("{:016x}", self.hash)
    }
}

/// FxHash; deterministic across runs, unlike `RandomState`
#[inline]
fn fx_hash(bytes: &[u8]) -> u64 {
    const SEED: u64 = 0x517cc1b727220a95;
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.url == other.url
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_query_is_stripped() {
        let (_, a) = CacheKey::parse("https://cdn.example.com/u/42.png?token=abc").unwrap();
        let (_, b) = CacheKey::parse("https://cdn.example.com/u/42.png?token=xyz&s=64").unwrap();
        let (_, c) = CacheKey::parse("https://cdn.example.com/u/42.png").unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "https://cdn.example.com/u/42.png");
    }

    #[test]
    fn test_original_url_keeps_query() {
        let (url, key) = CacheKey::parse("https://cdn.example.com/a.png?sig=1").unwrap();
        assert_eq!(url.query(), Some("sig=1"));
        assert_eq!(key.as_str(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_distinct_paths_differ() {
        let (_, a) = CacheKey::parse("https://cdn.example.com/a.png").unwrap();
        let (_, b) = CacheKey::parse("https://cdn.example.com/b.png").unwrap();
        let (_, c) = CacheKey::parse("https://other.example.com/a.png").unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fragment_is_preserved() {
        let (_, key) = CacheKey::parse("https://cdn.example.com/a.svg?v=2#icon").unwrap();
        assert_eq!(key.as_str(), "https://cdn.example.com/a.svg#icon");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert_matches!(CacheKey::parse(""), Err(FetchError::InvalidRequestData(_)));
        assert_matches!(CacheKey::parse("   "), Err(FetchError::InvalidRequestData(_)));
        assert_matches!(
            CacheKey::parse("not a url"),
            Err(FetchError::InvalidRequestData(_))
        );
        assert_matches!(
            CacheKey::parse("mailto:someone@example.com"),
            Err(FetchError::InvalidRequestData(_))
        );
    }

    #[test]
    fn test_file_urls_rejected() {
        assert_matches!(
            CacheKey::parse("file:///var/images/a.png"),
            Err(FetchError::InvalidRequestData(_))
        );
    }

    #[test]
    fn test_from_normalized_round_trips() {
        let (_, key) = CacheKey::parse("https://cdn.example.com/a.png?x=1").unwrap();
        let restored = CacheKey::from_normalized(key.as_str());
        assert_eq!(key, restored);
        assert_eq!(key.file_stem(), restored.file_stem());
        assert_eq!(key.file_stem().len(), 16);
    }

    #[test]
    fn test_shard_index_in_range() {
        for i in 0..1000 {
            let key = CacheKey::from_normalized(&format!("https://cdn.example.com/{}.png", i));
            assert!(key.shard_index(16) < 16);
        }
    }
}
