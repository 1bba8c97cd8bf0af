use thiserror::Error;

/// Validation errors for canonical primitives.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When an encoded value cannot be decoded.
    #[error("{field} is not valid {encoding}")]
    InvalidEncoding {
        /// Field name that failed decoding.
        field: &'static str,
        /// Expected encoding (e.g. `base64url`).
        encoding: &'static str,
    },
}
