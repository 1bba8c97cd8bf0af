use canonical_json::to_string;
use serde_json::Value;

use crate::identifiers::ProfileId;
use std::fmt;

/// Profile used for every hash the oracle computes.
pub const DEFAULT_PROFILE: &str = "url-oracle-canonical-v1";

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// Provided JSON could not be canonicalized.
    #[error("invalid JSON structure: {0}")]
    InvalidStructure(String),
    /// Non-finite or fractional number detected.
    #[error("non-integer number detected at {0}")]
    NonIntegerNumber(String),
    /// Generic failure.
    #[error("other error: {0}")]
    Other(String),
}

/// Helper for building JSON paths during validation.
#[derive(Debug, Clone)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Canonicalizer that emits deterministic bytes.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    profile: ProfileId,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(ProfileId::parse(DEFAULT_PROFILE).expect("default profile id is valid"))
    }
}

impl Canonicalizer {
    /// Creates a new canonicalizer for the provided profile.
    pub fn new(profile: ProfileId) -> Self {
        Self { profile }
    }

    /// Profile this canonicalizer was created for.
    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    /// Produces canonical UTF-8 bytes for `value`.
    ///
    /// Floating point numbers are rejected; hashed values carry integers only.
    pub fn canonicalize(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        Self::validate(value, Path::root())?;

        // RFC 8785 canonicalization
        let canonical =
            to_string(value).map_err(|err| CanonicalizationError::Other(err.to_string()))?;
        Ok(canonical.into_bytes())
    }

    fn validate(value: &Value, path: Path) -> Result<(), CanonicalizationError> {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    Self::validate(child, path.push_field(key))?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    Self::validate(item, path.push_index(idx))?;
                }
                Ok(())
            }
            Value::Number(num) => {
                if num.is_f64() {
                    return Err(CanonicalizationError::NonIntegerNumber(format!("{}", path)));
                }
                Ok(())
            }
            Value::String(_) | Value::Bool(_) | Value::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_floats_with_path() {
        let err = Canonicalizer::default()
            .canonicalize(&json!({"a": [1, {"b": 1.5}]}))
            .unwrap_err();
        assert!(err.to_string().contains("a.[1].b"), "{err}");
    }
}
