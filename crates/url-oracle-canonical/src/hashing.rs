//! Digest computation with domain-separated hashing.
//!
//! Digests are computed as: `sha256(domain_separator || canonical_bytes(value))`.
//! Callers pick the separator; the payload model uses one per schema version
//! so that a digest can never be reinterpreted under a different layout.

use crate::{Canonicalizer, Digest, DigestAlg};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest as Sha2Digest, Sha256};

/// Canonical bytes of any serializable value.
pub fn canonical_bytes<T: Serialize>(
    value: &T,
    canonicalizer: &Canonicalizer,
) -> Result<Vec<u8>, HashError> {
    let value: Value =
        serde_json::to_value(value).map_err(|e| HashError::Serialization(e.to_string()))?;
    Ok(canonicalizer.canonicalize(&value)?)
}

/// Computes the domain-separated digest of a serializable value.
///
/// # Example
///
/// ```rust
/// use url_oracle_canonical::{compute_digest, Canonicalizer};
/// use serde_json::json;
///
/// let canonicalizer = Canonicalizer::default();
/// let a = compute_digest(b"example:v1\0", &json!({"b": 1, "a": 2}), &canonicalizer)?;
/// let b = compute_digest(b"example:v1\0", &json!({"a": 2, "b": 1}), &canonicalizer)?;
/// assert_eq!(a, b);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns [`HashError`] if serialization or canonicalization fails.
pub fn compute_digest<T: Serialize>(
    domain_separator: &[u8],
    value: &T,
    canonicalizer: &Canonicalizer,
) -> Result<Digest, HashError> {
    let bytes = canonical_bytes(value, canonicalizer)?;

    let mut hasher = Sha256::new();
    hasher.update(domain_separator);
    hasher.update(&bytes);
    let hash_bytes = hasher.finalize();

    Ok(Digest::from_raw(DigestAlg::Sha256, &hash_bytes)?)
}

/// Error during digest computation.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Canonicalization failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] crate::CanonicalizationError),
    /// Digest construction failed.
    #[error("digest construction failed: {0}")]
    Digest(#[from] crate::ValidationError),
}
