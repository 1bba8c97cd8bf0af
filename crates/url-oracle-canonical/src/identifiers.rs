use crate::validation::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype {
    ($name:ident, $doc:expr, $pattern:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses a validated identifier from a string.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                let s = value.into();
                if !Regex::new($pattern).expect("invalid regex").is_match(&s) {
                    return Err(ValidationError::PatternMismatch {
                        field: stringify!($name),
                        value: s,
                    });
                }
                Ok(Self(s))
            }

            /// Borrows the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    ProfileId,
    "Identifier for canonicalization profiles (pattern: `[A-Za-z0-9_-]{16,128}`)",
    r"^[A-Za-z0-9_-]{16,128}$"
);
newtype!(
    Timestamp,
    "UTC RFC3339 timestamp with `Z` suffix, whole seconds.",
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_requires_utc_seconds() {
        assert!(Timestamp::parse("2024-01-01T00:00:00Z").is_ok());
        assert!(Timestamp::parse("2024-01-01T00:00:00+02:00").is_err());
        assert!(Timestamp::parse("2024-01-01T00:00:00.123Z").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let bad: Result<Timestamp, _> = serde_json::from_str("\"yesterday\"");
        assert!(bad.is_err());
        let good: Timestamp = serde_json::from_str("\"2025-06-30T12:00:01Z\"").unwrap();
        assert_eq!(good.as_str(), "2025-06-30T12:00:01Z");
    }
}
