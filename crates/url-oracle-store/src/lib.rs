//! Persistence for url-oracle attestations.
//!
//! This crate provides:
//! - Atomic reading and writing of attestation and chain-pointer files
//! - The `check_for_change` decision over a previous attestation file
//! - Directory- and script-backed [`ArtifactStore`](url_oracle_core::ArtifactStore)s
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use url_oracle_canonical::Digest;
//! use url_oracle_store::{check_for_change, read_attestation};
//!
//! let previous = Path::new("previous/attestation.json");
//! let digest = Digest::sha256(br#"{"v":2}"#);
//! if check_for_change(&digest, Some(previous)) {
//!     println!("content changed");
//! }
//! let attestation = read_attestation(previous)?;
//! println!("{}", attestation.payload.url);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(missing_docs)]

/// Previous-artifact stores.
pub mod artifacts;
/// Change detection.
pub mod change;
/// Error types for store operations.
pub mod errors;
/// Attestation and chain-pointer files.
pub mod files;

pub use artifacts::{ArtifactExit, CommandArtifactStore, DirectoryArtifactStore, EXIT_NOT_FOUND};
pub use change::check_for_change;
pub use errors::StoreError;
pub use files::{
    read_attestation, read_details, write_attestation, write_details, ATTESTATION_FILE,
    DETAILS_FILE,
};
