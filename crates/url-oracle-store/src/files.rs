//! Attestation and chain-pointer files.
//!
//! Files are pretty-printed JSON. Writes go to a temporary file in the
//! destination directory which is then renamed over the destination, so a
//! reader never observes a partially written attestation.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;
use url_oracle_core::{Attestation, AttestationDetails};

use crate::errors::StoreError;

/// File name of a persisted attestation inside an artifact directory.
pub const ATTESTATION_FILE: &str = "attestation.json";
/// File name of a chain pointer inside an artifact directory.
pub const DETAILS_FILE: &str = "attestation-details.json";

/// Reads an attestation file.
pub fn read_attestation(path: &Path) -> Result<Attestation, StoreError> {
    read_json(path)
}

/// Atomically writes an attestation file.
pub fn write_attestation(path: &Path, attestation: &Attestation) -> Result<(), StoreError> {
    write_json_atomic(path, attestation)
}

/// Reads a chain-pointer file.
pub fn read_details(path: &Path) -> Result<AttestationDetails, StoreError> {
    read_json(path)
}

/// Atomically writes a chain-pointer file.
pub fn write_details(path: &Path, details: &AttestationDetails) -> Result<(), StoreError> {
    write_json_atomic(path, details)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(StoreError::NoParent(path.to_path_buf())),
    };

    let mut json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push(b'\n');

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(&json).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "wrote file");
    Ok(())
}
