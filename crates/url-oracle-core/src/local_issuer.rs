//! An OIDC issuer backed by a local Ed25519 key.
//!
//! Mints EdDSA-signed ID tokens carrying whatever claims it was configured
//! with. Used for offline runs and tests; its [`jwks`](LocalIssuer::jwks)
//! output lets JWKS-based verifiers trust it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde_json::{json, Map, Value};
use tracing::debug;
use url_oracle_canonical::Digest;

use crate::claims::{jwt_error, CLAIM_ISSUED_AT};
use crate::errors::IdentityError;
use crate::jws::EDDSA;
use crate::signer::OidcProvider;

/// Lifetime of minted tokens, in seconds.
const TOKEN_TTL_SECS: i64 = 300;

/// Locally keyed OIDC issuer.
#[derive(Clone)]
pub struct LocalIssuer {
    issuer: String,
    key: SigningKey,
    claims: Map<String, Value>,
}

impl LocalIssuer {
    /// Issuer with a freshly generated key.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self::from_key(issuer, SigningKey::generate(&mut OsRng))
    }

    /// Issuer with a fixed key seed.
    pub fn from_seed(issuer: impl Into<String>, seed: [u8; 32]) -> Self {
        Self::from_key(issuer, SigningKey::from_bytes(&seed))
    }

    fn from_key(issuer: impl Into<String>, key: SigningKey) -> Self {
        Self {
            issuer: issuer.into(),
            key,
            claims: Map::new(),
        }
    }

    /// Adds a claim to every token this issuer mints.
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Public half of the issuer key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Key identifier placed in token headers and in the JWK.
    pub fn key_id(&self) -> String {
        let digest = Digest::sha256(self.verifying_key().as_bytes());
        digest.b64[..16].to_string()
    }

    /// JSON Web Key Set holding the issuer's public key.
    pub fn jwks(&self) -> Value {
        json!({
            "keys": [{
                "kty": "OKP",
                "crv": "Ed25519",
                "use": "sig",
                "alg": EDDSA,
                "kid": self.key_id(),
                "x": URL_SAFE_NO_PAD.encode(self.verifying_key().as_bytes()),
            }]
        })
    }
}

impl OidcProvider for LocalIssuer {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    fn request_id_token(&self, audience: &str) -> Result<String, IdentityError> {
        let mut claims = self.claims.clone();
        if !claims.contains_key(CLAIM_ISSUED_AT) {
            claims.insert(CLAIM_ISSUED_AT.into(), json!(Utc::now().timestamp()));
        }
        let issued_at = claims
            .get(CLAIM_ISSUED_AT)
            .and_then(Value::as_i64)
            .unwrap_or_default();
        claims.insert("iss".into(), json!(self.issuer));
        claims.insert("aud".into(), json!(audience));
        claims
            .entry("exp")
            .or_insert_with(|| json!(issued_at + TOKEN_TTL_SECS));

        let der = self
            .key
            .to_pkcs8_der()
            .map_err(|e| IdentityError::Key(e.to_string()))?;
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.key_id());
        debug!(issuer = %self.issuer, "minting local ID token");
        encode(&header, &claims, &EncodingKey::from_ed_der(der.as_bytes())).map_err(jwt_error)
    }

    /// Checks the signature only; `iss` and `aud` are compared by the caller.
    fn verify_id_token(&self, id_token: &str) -> Result<Map<String, Value>, IdentityError> {
        let key = DecodingKey::from_ed_der(self.verifying_key().as_bytes());
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<Map<String, Value>>(id_token, &key, &validation)
            .map(|data| data.claims)
            .map_err(jwt_error)
    }
}
