//! Attestation payloads, chain linking, building and verification for url-oracle.
//!
//! This crate provides:
//! - The signed [`AttestationPayload`] and persisted [`Attestation`] records
//! - Schema-versioned, domain-separated payload hashing
//! - The identity seam: opaque identity tokens, claim extraction and
//!   ephemeral-key signing bound to an OIDC token
//! - The [`ChainLinker`] that resolves the previous attestation of a job
//! - The [`AttestationBuilder`] and the seven-check [`Verifier`]
//!
//! Core invariants:
//! - Content digests and sizes are always recomputed from content
//! - The same hash function is used when signing and when verifying
//! - Commit, timestamp and workflow bindings come only from token claims
//! - Verification never short-circuits; every check is recorded
//!
#![deny(missing_docs)]

/// Attestation builder.
pub mod builder;
/// Chain linking against prior artifacts.
pub mod chain;
/// Identity tokens and claim extraction.
pub mod claims;
/// Error types for core operations.
pub mod errors;
/// Content fetching seam.
pub mod fetch;
/// Compact JWS helpers.
pub mod jws;
/// Locally keyed OIDC issuer.
pub mod local_issuer;
/// Payload model and hashing.
pub mod payload;
/// Ephemeral-key signing and token verification.
pub mod signer;
/// Verification checks and results.
pub mod verification;

pub use builder::AttestationBuilder;
pub use chain::{ArtifactLookup, ArtifactStore, ChainLink, ChainLinker, JobIdentity, PreviousArtifact};
pub use claims::{extract_claims, ClientInstanceClaims, IdentityClaims, IdentityToken};
pub use errors::{BuildError, ChainError, FetchError, IdentityError, PayloadError};
pub use fetch::{ContentFetcher, FetchedContent};
pub use local_issuer::LocalIssuer;
pub use payload::{
    content_changed, Attestation, AttestationDetails, AttestationPayload, PayloadFields,
    SchemaVersion,
};
pub use signer::{
    verify_signed_message, EphemeralSigner, IdentitySigner, OidcProvider, PkTokenVerifier,
    SignerSession, TokenVerifier,
};
pub use verification::{
    CheckKind, CheckResult, CheckResultStatus, VerificationResult, Verifier, VerifyContext,
};
