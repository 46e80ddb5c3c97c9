//! Cache keys and content digests.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex characters kept from the key digest.
pub const CACHE_KEY_LEN: usize = 16;

/// Deterministic cache key for one artifact.
///
/// Derived from the `(name, version, filename)` tuple only, never from file
/// contents, so it can be computed before anything is downloaded. Fields are
/// NUL separated so `("a-b", "1")` and `("a", "b-1")` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an artifact.
    pub fn derive(name: &str, version: &str, filename: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(version.as_bytes());
        hasher.update([0]);
        hasher.update(filename.as_bytes());
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(CACHE_KEY_LEN);
        Self(hex)
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Rejected digest text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid sha256 digest '{0}': expected 64 hex characters")]
pub struct DigestError(String);

/// A validated SHA256 digest (64 lowercase hex characters).
///
/// Index metadata publishes these per artifact; the downloader checks the
/// streamed bytes against it when present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Validate and normalize a digest. A `sha256:` prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] unless the hex portion is exactly 64 ASCII
    /// hex characters.
    pub fn new(s: &str) -> Result<Self, DigestError> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError(s.to_string()));
        }
        Ok(Self(hex.to_lowercase()))
    }

    /// Digest of an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Return the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let a = CacheKey::derive("numpy", "1.26.4", "numpy-1.26.4-cp311-cp311-linux_x86_64.whl");
        let b = CacheKey::derive("numpy", "1.26.4", "numpy-1.26.4-cp311-cp311-linux_x86_64.whl");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CACHE_KEY_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_respects_field_boundaries() {
        let a = CacheKey::derive("a-b", "1", "f.whl");
        let b = CacheKey::derive("a", "b-1", "f.whl");
        assert_ne!(a, b);
    }

    #[test]
    fn sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename("pkg-1.0.0-py3-none-any.whl"), "pkg-1.0.0-py3-none-any.whl");
        assert_eq!(sanitize_filename("a b/c+d.whl"), "a_b_c_d.whl");
    }

    #[test]
    fn digest_validation() {
        let hex = "a".repeat(64);
        assert!(Sha256Digest::new(&hex).is_ok());
        assert!(Sha256Digest::new(&format!("sha256:{}", hex.to_uppercase())).is_ok());
        assert!(Sha256Digest::new("abc").is_err());
        assert!(Sha256Digest::new(&"g".repeat(64)).is_err());
    }

    #[test]
    fn digest_compute_known_value() {
        assert_eq!(
            Sha256Digest::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
