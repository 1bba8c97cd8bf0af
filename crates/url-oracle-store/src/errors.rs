use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur reading or writing attestation files.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error on a specific file.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON of the expected shape.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The destination has no parent directory to stage a temporary file in.
    #[error("cannot write {0}: no parent directory")]
    NoParent(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
