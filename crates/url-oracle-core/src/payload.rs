//! Attestation payload model and schema-versioned hashing.
//!
//! The digest of a payload is
//! `sha256(domain_separator(version) || canonical_json(hash_input(version)))`.
//! The hash input is assembled field by field for each schema version, so
//! adding a field to [`AttestationPayload`] never silently changes the digest
//! of an older version.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url_oracle_canonical::{b64, canonical_bytes, compute_digest, Canonicalizer, Digest, Timestamp};

use crate::claims::IdentityToken;
use crate::errors::PayloadError;

/// Layout version of an [`AttestationPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SchemaVersion {
    /// Legacy layout without `schema_version` or `workflow_ref` in the hash.
    #[default]
    V1,
    /// Adds `schema_version` and `workflow_ref` to the hash input.
    V2,
}

impl SchemaVersion {
    /// Version every new attestation is built with.
    pub const CURRENT: SchemaVersion = SchemaVersion::V2;

    /// Numeric form, as persisted.
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Domain separator prefixed to the canonical hash input.
    pub const fn domain_separator(self) -> &'static [u8] {
        match self {
            Self::V1 => b"url-oracle:payload:v1\0",
            Self::V2 => b"url-oracle:payload:v2\0",
        }
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = PayloadError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(PayloadError::UnsupportedSchema(other)),
        }
    }
}

impl From<SchemaVersion> for u32 {
    fn from(version: SchemaVersion) -> Self {
        version.as_u32()
    }
}

/// The signed observation: what was seen at a URL, when, and by which run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationPayload {
    /// Layout version; absent in legacy files, which are version 1.
    #[serde(default)]
    pub schema_version: SchemaVersion,
    /// Revision of the workflow that made the observation.
    pub commit_sha: String,
    /// Issued-at time of the identity token.
    pub timestamp: Timestamp,
    /// Observed resource.
    pub url: String,
    /// Fetched bytes, embedded verbatim.
    #[serde(with = "b64")]
    pub content: Vec<u8>,
    /// SHA-256 of `content`.
    pub content_digest: Digest,
    /// Length of `content` in bytes.
    pub content_size: u64,
    /// Digest of the preceding payload in this job's chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attestation_digest: Option<Digest>,
    /// Workflow reference of the signing job (version 2 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_ref: Option<String>,
}

/// The caller-visible inputs of a payload.
///
/// Digest and size are absent: they are derived from `content` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFields {
    /// Layout to build.
    pub schema_version: SchemaVersion,
    /// Revision from the identity token.
    pub commit_sha: String,
    /// Issued-at time from the identity token.
    pub timestamp: Timestamp,
    /// Observed resource.
    pub url: String,
    /// Fetched bytes.
    pub content: Vec<u8>,
    /// Chain link, if any.
    pub previous_attestation_digest: Option<Digest>,
    /// Workflow reference from the identity token.
    pub workflow_ref: Option<String>,
}

impl AttestationPayload {
    /// Builds a payload, computing `content_digest` and `content_size`.
    ///
    /// Version 2 requires `workflow_ref`; version 1 never carries one.
    pub fn build(fields: PayloadFields) -> Result<Self, PayloadError> {
        let workflow_ref = match fields.schema_version {
            SchemaVersion::V1 => None,
            SchemaVersion::V2 => Some(fields.workflow_ref.ok_or(PayloadError::MissingField {
                version: 2,
                field: "workflow_ref",
            })?),
        };

        Ok(Self {
            schema_version: fields.schema_version,
            commit_sha: fields.commit_sha,
            timestamp: fields.timestamp,
            url: fields.url,
            content_digest: Digest::sha256(&fields.content),
            content_size: fields.content.len() as u64,
            content: fields.content,
            previous_attestation_digest: fields.previous_attestation_digest,
            workflow_ref,
        })
    }

    /// The visible fields of this payload, ignoring stored digest and size.
    pub fn fields(&self) -> PayloadFields {
        PayloadFields {
            schema_version: self.schema_version,
            commit_sha: self.commit_sha.clone(),
            timestamp: self.timestamp.clone(),
            url: self.url.clone(),
            content: self.content.clone(),
            previous_attestation_digest: self.previous_attestation_digest.clone(),
            workflow_ref: self.workflow_ref.clone(),
        }
    }

    /// Builds a fresh payload from this one's visible fields under the
    /// rules of its stored schema version.
    ///
    /// Fails when a field the version does not hash is present.
    pub fn rebuild(&self) -> Result<Self, PayloadError> {
        self.check_layout()?;
        Self::build(self.fields())
    }

    /// Every field present must be covered by the version's hash input.
    fn check_layout(&self) -> Result<(), PayloadError> {
        match (self.schema_version, &self.workflow_ref) {
            (SchemaVersion::V1, Some(_)) => Err(PayloadError::UnexpectedField {
                version: 1,
                field: "workflow_ref",
            }),
            (SchemaVersion::V2, None) => Err(PayloadError::MissingField {
                version: 2,
                field: "workflow_ref",
            }),
            _ => Ok(()),
        }
    }

    /// True when the stored digest and size describe the stored content.
    pub fn content_is_consistent(&self) -> bool {
        self.content_digest == Digest::sha256(&self.content)
            && self.content_size == self.content.len() as u64
    }

    /// The object that is canonicalized and hashed for this payload.
    pub fn hash_input(&self) -> Result<Value, PayloadError> {
        self.check_layout()?;
        let mut input = Map::new();
        if self.schema_version == SchemaVersion::V2 {
            input.insert("schema_version".into(), json!(self.schema_version.as_u32()));
        }
        input.insert("commit_sha".into(), json!(self.commit_sha));
        input.insert("timestamp".into(), json!(self.timestamp.as_str()));
        input.insert("url".into(), json!(self.url));
        input.insert("content".into(), json!(b64::encode(&self.content)));
        input.insert("content_digest".into(), json!(self.content_digest));
        input.insert("content_size".into(), json!(self.content_size));
        if let Some(previous) = &self.previous_attestation_digest {
            input.insert("previous_attestation_digest".into(), json!(previous));
        }
        if let Some(workflow_ref) = &self.workflow_ref {
            input.insert("workflow_ref".into(), json!(workflow_ref));
        }
        Ok(Value::Object(input))
    }

    /// Canonical bytes of [`hash_input`](Self::hash_input), without the
    /// domain separator.
    pub fn canonical_hash_input(&self, canonicalizer: &Canonicalizer) -> Result<Vec<u8>, PayloadError> {
        Ok(canonical_bytes(&self.hash_input()?, canonicalizer)?)
    }

    /// Digest of this payload. The builder signs exactly this value and the
    /// verifier recomputes it the same way.
    pub fn digest(&self, canonicalizer: &Canonicalizer) -> Result<Digest, PayloadError> {
        Ok(compute_digest(
            self.schema_version.domain_separator(),
            &self.hash_input()?,
            canonicalizer,
        )?)
    }
}

/// Decides whether new content differs from a previous observation.
///
/// Returns `true` when there is no previous payload, or when the previous
/// payload's stored digest does not describe its own content; `false` only
/// when the previous content hashes exactly to `new_digest`.
pub fn content_changed(new_digest: &Digest, previous: Option<&AttestationPayload>) -> bool {
    match previous {
        None => true,
        Some(previous) if !previous.content_is_consistent() => true,
        Some(previous) => previous.content_digest != *new_digest,
    }
}

/// The persisted unit: a payload, the identity token that vouches for the
/// signer, and the signature over the payload digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Signed payload.
    pub payload: AttestationPayload,
    /// Identity token of the signing run, stored as issued.
    pub identity_token: IdentityToken,
    /// Signed payload digest.
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

/// Lightweight chain pointer to a previous attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationDetails {
    /// Payload digest of the attestation pointed to.
    pub digest: Digest,
    /// Where that attestation can be retrieved.
    pub artifact_locator: String,
}
