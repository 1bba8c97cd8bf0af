use thiserror::Error;
use url_oracle_canonical::{HashError, ValidationError};

/// Errors from the payload model.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The payload declares a schema version this build does not know.
    #[error("unsupported payload schema version {0}")]
    UnsupportedSchema(u32),
    /// A field required by the payload's schema version is absent.
    #[error("schema version {version} requires field `{field}`")]
    MissingField {
        /// Schema version being built.
        version: u32,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A field the schema version does not hash is present.
    #[error("schema version {version} does not carry field `{field}`")]
    UnexpectedField {
        /// Schema version of the payload.
        version: u32,
        /// Name of the unexpected field.
        field: &'static str,
    },
    /// Hashing the payload failed.
    #[error("payload hashing failed: {0}")]
    Hash(#[from] HashError),
}

/// Errors from the identity seam: token issuance, claims and signatures.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The provider could not be configured or reached.
    #[error("identity provider unavailable: {0}")]
    Provider(String),
    /// The provider refused to issue a token.
    #[error("authentication rejected: {0}")]
    Rejected(String),
    /// A JWS or JWT did not have the expected structure.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// The token uses an algorithm this verifier does not accept.
    #[error("unsupported signing algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    /// A signature did not verify.
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),
    /// A required claim is absent or has the wrong type.
    #[error("required claim `{0}` missing from identity token")]
    MissingClaim(&'static str),
    /// The token was issued by an unexpected issuer.
    #[error("issuer mismatch: expected {expected}, token has {actual}")]
    IssuerMismatch {
        /// Issuer the verifier trusts.
        expected: String,
        /// Issuer named by the token.
        actual: String,
    },
    /// The token audience does not commit to the embedded ephemeral key.
    #[error("audience does not commit to the ephemeral key (expected {expected})")]
    AudienceMismatch {
        /// Commitment computed from the client instance claims.
        expected: String,
    },
    /// Encoding or key material could not be processed.
    #[error("invalid key material: {0}")]
    Key(String),
    /// Canonical hashing failed.
    #[error("hashing failed: {0}")]
    Hash(#[from] HashError),
    /// A canonical value failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from the chain linker. `NotFound` is never an error.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The workflow reference does not decompose into the expected segments.
    #[error("malformed workflow reference `{value}`: {reason}")]
    MalformedWorkflowRef {
        /// The offending reference.
        value: String,
        /// Which part of the shape is wrong.
        reason: &'static str,
    },
    /// The artifact store failed for operational reasons.
    #[error("artifact lookup via {store} failed: {reason}")]
    Lookup {
        /// Store implementation that failed.
        store: &'static str,
        /// Underlying cause.
        reason: String,
    },
    /// The previous attestation could not be hashed.
    #[error("previous attestation could not be hashed: {0}")]
    Payload(#[from] PayloadError),
}

/// Errors from the content fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("failed to download content from {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying cause.
        reason: String,
    },
    /// The server answered with a non-success status.
    #[error("HTTP request for {url} failed with status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },
}

/// Errors that abort an attestation build. Each variant names the step.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Step 1: the content could not be fetched.
    #[error("content fetch failed: {0}")]
    Fetch(#[source] FetchError),
    /// The fetcher reported a digest that does not match the bytes it returned.
    #[error("fetcher reported digest {reported} but content hashes to {computed}")]
    ContentDigestMismatch {
        /// Digest reported by the fetcher.
        reported: String,
        /// Digest computed from the content.
        computed: String,
    },
    /// Step 2: authentication with the identity provider failed.
    #[error("authentication failed: {0}")]
    Authentication(#[source] IdentityError),
    /// Step 2: a required claim could not be extracted.
    #[error("claim extraction failed: {0}")]
    Claims(#[source] IdentityError),
    /// Step 3: the chain linker failed.
    #[error("chain linking failed: {0}")]
    ChainLink(#[source] ChainError),
    /// Step 4: the payload could not be built or hashed.
    #[error("payload construction failed: {0}")]
    Payload(#[from] PayloadError),
    /// Step 4: signing the payload digest failed.
    #[error("signing failed: {0}")]
    Signing(#[source] IdentityError),
}
