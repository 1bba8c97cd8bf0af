//! Identity tokens and the claim-extraction seam.
//!
//! The identity token is stored exactly as the provider issued it. The only
//! code that looks inside it is [`extract_claims`] (and the token verifier);
//! everything else treats it as opaque.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat};
use ed25519_dalek::VerifyingKey;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url_oracle_canonical::{canonical_bytes, Canonicalizer, Digest, Timestamp};

use crate::errors::IdentityError;
use crate::jws::EDDSA;

/// Claim carrying the commit of the workflow definition.
pub const CLAIM_WORKFLOW_SHA: &str = "job_workflow_sha";
/// Claim carrying the workflow reference (`owner/repo/.github/workflows/f@ref`).
pub const CLAIM_WORKFLOW_REF: &str = "job_workflow_ref";
/// Claim carrying the issued-at time in Unix seconds.
pub const CLAIM_ISSUED_AT: &str = "iat";
/// Claim carrying the repository (`owner/repo`) the job ran in.
pub const CLAIM_REPOSITORY: &str = "repository";

/// Client instance claims: the ephemeral public key and a random nonce.
///
/// The ID token audience is the hash of these claims, which is how the
/// issuer's signature comes to vouch for the ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInstanceClaims {
    /// Algorithm of the ephemeral key (always `EdDSA`).
    pub alg: String,
    /// Base64url ephemeral public key.
    pub upk: String,
    /// Base64url random nonce.
    pub rz: String,
}

impl ClientInstanceClaims {
    /// Claims for an Ed25519 public key and nonce.
    pub fn new(key: &VerifyingKey, nonce: &[u8]) -> Self {
        Self {
            alg: EDDSA.to_string(),
            upk: URL_SAFE_NO_PAD.encode(key.as_bytes()),
            rz: URL_SAFE_NO_PAD.encode(nonce),
        }
    }

    /// The value the ID token audience must equal.
    pub fn commitment(&self, canonicalizer: &Canonicalizer) -> Result<String, IdentityError> {
        let bytes = canonical_bytes(self, canonicalizer)?;
        Ok(Digest::sha256(&bytes).b64)
    }

    /// Decodes the ephemeral public key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, IdentityError> {
        if self.alg != EDDSA {
            return Err(IdentityError::UnsupportedAlgorithm(self.alg.clone()));
        }
        let raw = URL_SAFE_NO_PAD
            .decode(&self.upk)
            .map_err(|_| IdentityError::Key("upk is not base64url".to_string()))?;
        let raw: [u8; 32] = raw
            .try_into()
            .map_err(|_| IdentityError::Key("upk must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(&raw).map_err(|e| IdentityError::Key(e.to_string()))
    }
}

/// Opaque identity token: the provider's ID token plus the client instance
/// claims it commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityToken {
    /// Compact JWT exactly as issued.
    pub id_token: String,
    /// Ephemeral key material bound through the audience.
    pub cic: ClientInstanceClaims,
}

impl IdentityToken {
    /// Decodes the ID token claims without verifying the issuer signature.
    pub fn unverified_claims(&self) -> Result<Map<String, Value>, IdentityError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<Map<String, Value>>(&self.id_token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(jwt_error)
    }
}

pub(crate) fn jwt_error(e: JwtError) -> IdentityError {
    match e.kind() {
        ErrorKind::InvalidSignature => IdentityError::InvalidSignature(e.to_string()),
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            IdentityError::UnsupportedAlgorithm(e.to_string())
        }
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
            IdentityError::Key(e.to_string())
        }
        _ => IdentityError::Malformed(e.to_string()),
    }
}

/// Claims the oracle trusts from an identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Commit of the workflow definition that ran.
    pub commit_sha: String,
    /// Issued-at time of the token.
    pub timestamp: Timestamp,
    /// Workflow reference of the job.
    pub workflow_ref: String,
    /// Repository (`owner/repo`), when the issuer provides it.
    pub repository: Option<String>,
}

/// Extracts the commit, timestamp and workflow bindings from a token.
///
/// Fails on the first missing required claim.
pub fn extract_claims(token: &IdentityToken) -> Result<IdentityClaims, IdentityError> {
    let claims = token.unverified_claims()?;
    claims_from_map(&claims)
}

pub(crate) fn claims_from_map(claims: &Map<String, Value>) -> Result<IdentityClaims, IdentityError> {
    let commit_sha = required_str(claims, CLAIM_WORKFLOW_SHA)?;
    let workflow_ref = required_str(claims, CLAIM_WORKFLOW_REF)?;
    let issued_at = claims
        .get(CLAIM_ISSUED_AT)
        .and_then(Value::as_i64)
        .filter(|iat| *iat > 0)
        .ok_or(IdentityError::MissingClaim(CLAIM_ISSUED_AT))?;
    let timestamp = timestamp_from_unix(issued_at)?;
    let repository = claims
        .get(CLAIM_REPOSITORY)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(IdentityClaims {
        commit_sha,
        timestamp,
        workflow_ref,
        repository,
    })
}

fn required_str(claims: &Map<String, Value>, name: &'static str) -> Result<String, IdentityError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(IdentityError::MissingClaim(name))
}

/// Formats Unix seconds as a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
pub fn timestamp_from_unix(secs: i64) -> Result<Timestamp, IdentityError> {
    let instant =
        DateTime::from_timestamp(secs, 0).ok_or(IdentityError::MissingClaim(CLAIM_ISSUED_AT))?;
    Ok(Timestamp::parse(
        instant.to_rfc3339_opts(SecondsFormat::Secs, true),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn iat_becomes_utc_timestamp() {
        let ts = timestamp_from_unix(1_704_067_200).unwrap();
        assert_eq!(ts.as_str(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn all_required_claims_extracted() {
        let claims = claims_from_map(&map(json!({
            "job_workflow_sha": "abc123",
            "job_workflow_ref": "kipz/url-oracle/.github/workflows/create-attestation.yml@refs/heads/main",
            "iat": 1_704_067_200,
            "repository": "kipz/url-oracle"
        })))
        .unwrap();
        assert_eq!(claims.commit_sha, "abc123");
        assert_eq!(claims.repository.as_deref(), Some("kipz/url-oracle"));
    }

    #[test]
    fn missing_claims_are_named() {
        let err = claims_from_map(&map(json!({
            "job_workflow_ref": "o/r/.github/workflows/w.yml@refs/heads/main",
            "iat": 1
        })))
        .unwrap_err();
        assert!(matches!(err, IdentityError::MissingClaim(CLAIM_WORKFLOW_SHA)));

        let err = claims_from_map(&map(json!({
            "job_workflow_sha": "abc",
            "job_workflow_ref": "o/r/.github/workflows/w.yml@refs/heads/main",
            "iat": 0
        })))
        .unwrap_err();
        assert!(matches!(err, IdentityError::MissingClaim(CLAIM_ISSUED_AT)));
    }

    #[test]
    fn unverified_claims_decode_without_a_key() {
        use crate::{LocalIssuer, OidcProvider};

        let issuer = LocalIssuer::from_seed("https://issuer.test", [9u8; 32])
            .with_claim(CLAIM_WORKFLOW_SHA, "abc123");
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let token = IdentityToken {
            id_token: issuer.request_id_token("aud-value").unwrap(),
            cic: ClientInstanceClaims::new(&key, &[1u8; 32]),
        };
        let claims = token.unverified_claims().unwrap();
        assert_eq!(claims[CLAIM_WORKFLOW_SHA], "abc123");
        assert_eq!(claims["aud"], "aud-value");

        let garbage = IdentityToken {
            id_token: "not-a-jwt".to_string(),
            ..token
        };
        assert!(matches!(garbage.unverified_claims(), Err(IdentityError::Malformed(_))));
    }

    #[test]
    fn commitment_depends_on_nonce() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let c = Canonicalizer::default();
        let a = ClientInstanceClaims::new(&key, &[1u8; 32]).commitment(&c).unwrap();
        let b = ClientInstanceClaims::new(&key, &[2u8; 32]).commitment(&c).unwrap();
        assert_ne!(a, b);
    }
}
