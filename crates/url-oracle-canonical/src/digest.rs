use std::fmt;
use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::validation::ValidationError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlg {
    /// SHA-256 (the only algorithm the oracle emits).
    #[serde(rename = "sha-256")]
    Sha256,
}

impl DigestAlg {
    /// Length in bytes of a raw digest of this algorithm.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }

    /// Stable textual name, as it appears in JSON.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
        }
    }
}

/// Algorithm + bytes digest, encoded as base64url without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    /// Digest algorithm (currently always `sha-256`).
    pub alg: DigestAlg,
    /// Base64URL (no padding) digest bytes.
    #[serde(rename = "b64")]
    pub b64: String,
}

fn b64_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{43,44}$").expect("invalid regex"))
}

impl Digest {
    /// Constructs a validated digest.
    pub fn new(alg: DigestAlg, b64: impl Into<String>) -> Result<Self, ValidationError> {
        let b64 = b64.into();
        if !b64_pattern().is_match(&b64) {
            return Err(ValidationError::PatternMismatch {
                field: "digest",
                value: b64,
            });
        }
        Ok(Digest { alg, b64 })
    }

    /// Wraps raw digest bytes produced by `alg`.
    pub fn from_raw(alg: DigestAlg, raw: &[u8]) -> Result<Self, ValidationError> {
        if raw.len() != alg.output_len() {
            return Err(ValidationError::PatternMismatch {
                field: "digest",
                value: format!("{} raw bytes", raw.len()),
            });
        }
        Self::new(alg, URL_SAFE_NO_PAD.encode(raw))
    }

    /// SHA-256 of `bytes`.
    pub fn sha256(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Digest {
            alg: DigestAlg::Sha256,
            b64: URL_SAFE_NO_PAD.encode(hash),
        }
    }

    /// Decodes the raw digest bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        let raw = URL_SAFE_NO_PAD
            .decode(&self.b64)
            .map_err(|_| ValidationError::InvalidEncoding {
                field: "digest",
                encoding: "base64url",
            })?;
        if raw.len() != self.alg.output_len() {
            return Err(ValidationError::PatternMismatch {
                field: "digest",
                value: self.b64.clone(),
            });
        }
        Ok(raw)
    }

    /// Returns true when `raw` is exactly the byte string this digest encodes.
    pub fn matches_raw(&self, raw: &[u8]) -> bool {
        self.to_bytes().map(|own| own == raw).unwrap_or(false)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alg.name(), self.b64)
    }
}
