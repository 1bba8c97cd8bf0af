//! Canonical data model primitives for url-oracle attestations.
//!
//! Every byte sequence that is hashed or signed by the oracle is produced by
//! this crate: RFC 8785 canonical JSON, domain-separated SHA-256 digests and
//! the base64 encodings used for binary fields in persisted JSON.
//!
#![deny(missing_docs)]

/// Serde helpers for base64-encoded binary fields.
pub mod b64;
/// Canonicalization helpers for deterministic hashing.
pub mod canonicalizer;
/// Digest/identifier primitives.
pub mod digest;
/// Domain-separated digests over canonical JSON.
pub mod hashing;
/// Core identifiers and newtypes.
pub mod identifiers;
/// Validation helpers used by canonical types.
pub mod validation;

pub use canonicalizer::{CanonicalizationError, Canonicalizer};
pub use digest::{Digest, DigestAlg};
pub use hashing::{canonical_bytes, compute_digest, HashError};
pub use identifiers::{ProfileId, Timestamp};
pub use validation::ValidationError;
