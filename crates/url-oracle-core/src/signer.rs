//! Ephemeral-key signing bound to an OIDC identity token, and its verifying half.
//!
//! ```text
//! EphemeralSigner::authenticate
//!     generate Ed25519 key + nonce  ->  cic
//!     audience = sha256(canonical(cic))
//!     provider.request_id_token(audience)  ->  IdentityToken { id_token, cic }
//! SignerSession::sign(msg)  ->  compact JWS over msg with the ephemeral key
//! ```

use std::fmt;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url_oracle_canonical::Canonicalizer;

use crate::claims::{ClientInstanceClaims, IdentityToken};
use crate::errors::IdentityError;
use crate::jws::{sign_compact, CompactJws, EDDSA};

/// An OpenID Connect provider able to issue and verify ID tokens.
pub trait OidcProvider {
    /// Issuer URL the provider's tokens carry in `iss`.
    fn issuer(&self) -> &str;

    /// Requests an ID token with the given audience.
    fn request_id_token(&self, audience: &str) -> Result<String, IdentityError>;

    /// Verifies the issuer signature of an ID token and returns its claims.
    ///
    /// Expiry is not enforced: attestations are verified long after the
    /// short-lived token expired.
    fn verify_id_token(&self, id_token: &str) -> Result<Map<String, Value>, IdentityError>;
}

impl<P: OidcProvider + ?Sized> OidcProvider for &P {
    fn issuer(&self) -> &str {
        (**self).issuer()
    }

    fn request_id_token(&self, audience: &str) -> Result<String, IdentityError> {
        (**self).request_id_token(audience)
    }

    fn verify_id_token(&self, id_token: &str) -> Result<Map<String, Value>, IdentityError> {
        (**self).verify_id_token(id_token)
    }
}

/// Produces an identity token together with a capability to sign under it.
pub trait IdentitySigner {
    /// Authenticates and returns a signing session.
    fn authenticate(&self) -> Result<SignerSession, IdentityError>;
}

impl<S: IdentitySigner + ?Sized> IdentitySigner for &S {
    fn authenticate(&self) -> Result<SignerSession, IdentityError> {
        (**self).authenticate()
    }
}

/// An identity token and the ephemeral key it is bound to.
pub struct SignerSession {
    token: IdentityToken,
    key: SigningKey,
}

impl SignerSession {
    /// Pairs a token with its ephemeral key.
    pub fn new(token: IdentityToken, key: SigningKey) -> Self {
        Self { token, key }
    }

    /// The identity token of this session.
    pub fn token(&self) -> &IdentityToken {
        &self.token
    }

    /// Consumes the session, dropping the ephemeral key.
    pub fn into_token(self) -> IdentityToken {
        self.token
    }

    /// Signs `message` under the ephemeral key.
    ///
    /// The result is a compact JWS whose payload is `message`; the verifier
    /// recovers the message from it.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let header = json!({
            "alg": EDDSA,
            "typ": "osm",
            "upk": self.token.cic.upk,
        });
        Ok(sign_compact(&header, message, &self.key)?.into_bytes())
    }
}

impl fmt::Debug for SignerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerSession")
            .field("cic", &self.token.cic)
            .finish_non_exhaustive()
    }
}

/// Signer that binds a fresh Ed25519 key to a token from `P`.
pub struct EphemeralSigner<P> {
    provider: P,
    canonicalizer: Canonicalizer,
}

impl<P: OidcProvider> EphemeralSigner<P> {
    /// Creates a signer for the given provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            canonicalizer: Canonicalizer::default(),
        }
    }
}

impl<P: OidcProvider> IdentitySigner for EphemeralSigner<P> {
    fn authenticate(&self) -> Result<SignerSession, IdentityError> {
        let key = SigningKey::generate(&mut OsRng);
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);

        let cic = ClientInstanceClaims::new(&key.verifying_key(), &nonce);
        let audience = cic.commitment(&self.canonicalizer)?;
        debug!(issuer = self.provider.issuer(), %audience, "requesting ID token");

        let id_token = self.provider.request_id_token(&audience)?;
        info!(issuer = self.provider.issuer(), "obtained ephemeral-key-bound ID token");

        Ok(SignerSession::new(IdentityToken { id_token, cic }, key))
    }
}

/// Verifying half of the identity capability.
pub trait TokenVerifier {
    /// Checks that `token` was issued by the expected provider and commits
    /// to its embedded ephemeral key.
    fn verify_token(&self, token: &IdentityToken) -> Result<(), IdentityError>;

    /// Verifies a signed message under the token's ephemeral key and
    /// returns the recovered message.
    fn verify_signed_message(
        &self,
        token: &IdentityToken,
        signed: &[u8],
    ) -> Result<Vec<u8>, IdentityError> {
        verify_signed_message(token, signed)
    }
}

/// Verifies a [`SignerSession::sign`] output and recovers the message.
pub fn verify_signed_message(
    token: &IdentityToken,
    signed: &[u8],
) -> Result<Vec<u8>, IdentityError> {
    let text = std::str::from_utf8(signed)
        .map_err(|_| IdentityError::Malformed("signed message is not UTF-8".to_string()))?;
    let jws = CompactJws::parse(text)?;
    if let Some(upk) = jws.header.get("upk").and_then(Value::as_str) {
        if upk != token.cic.upk {
            return Err(IdentityError::InvalidSignature(
                "signed message names a different ephemeral key".to_string(),
            ));
        }
    }
    jws.verify_eddsa(&token.cic.verifying_key()?)?;
    Ok(jws.payload)
}

/// Token verifier that trusts a single OIDC provider.
pub struct PkTokenVerifier<P> {
    provider: P,
    canonicalizer: Canonicalizer,
}

impl<P: OidcProvider> PkTokenVerifier<P> {
    /// Creates a verifier trusting `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            canonicalizer: Canonicalizer::default(),
        }
    }
}

impl<P: OidcProvider> TokenVerifier for PkTokenVerifier<P> {
    fn verify_token(&self, token: &IdentityToken) -> Result<(), IdentityError> {
        let claims = self.provider.verify_id_token(&token.id_token)?;

        let issuer = claims.get("iss").and_then(Value::as_str).unwrap_or_default();
        if issuer != self.provider.issuer() {
            return Err(IdentityError::IssuerMismatch {
                expected: self.provider.issuer().to_string(),
                actual: issuer.to_string(),
            });
        }

        let expected = token.cic.commitment(&self.canonicalizer)?;
        let committed = match claims.get("aud") {
            Some(Value::String(aud)) => *aud == expected,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(expected.as_str())),
            _ => false,
        };
        if !committed {
            return Err(IdentityError::AudienceMismatch { expected });
        }
        Ok(())
    }
}

impl<V: TokenVerifier + ?Sized> TokenVerifier for &V {
    fn verify_token(&self, token: &IdentityToken) -> Result<(), IdentityError> {
        (**self).verify_token(token)
    }

    fn verify_signed_message(
        &self,
        token: &IdentityToken,
        signed: &[u8],
    ) -> Result<Vec<u8>, IdentityError> {
        (**self).verify_signed_message(token, signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_issuer::LocalIssuer;

    fn issuer() -> LocalIssuer {
        LocalIssuer::new("https://issuer.test")
            .with_claim("job_workflow_sha", "abc123")
            .with_claim(
                "job_workflow_ref",
                "kipz/url-oracle/.github/workflows/create-attestation.yml@refs/heads/main",
            )
    }

    #[test]
    fn session_signatures_verify_under_token() {
        let issuer = issuer();
        let session = EphemeralSigner::new(&issuer).authenticate().unwrap();
        let signed = session.sign(b"digest bytes").unwrap();

        let verifier = PkTokenVerifier::new(&issuer);
        verifier.verify_token(session.token()).unwrap();
        let recovered = verifier
            .verify_signed_message(session.token(), &signed)
            .unwrap();
        assert_eq!(recovered, b"digest bytes");
    }

    #[test]
    fn token_from_other_issuer_fails() {
        let ours = issuer();
        let theirs = LocalIssuer::new("https://issuer.test");
        let session = EphemeralSigner::new(&theirs).authenticate().unwrap();
        let err = PkTokenVerifier::new(&ours)
            .verify_token(session.token())
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidSignature(_)), "{err}");
    }

    #[test]
    fn swapped_ephemeral_key_breaks_commitment() {
        let issuer = issuer();
        let first = EphemeralSigner::new(&issuer).authenticate().unwrap();
        let second = EphemeralSigner::new(&issuer).authenticate().unwrap();

        let mut forged = first.token().clone();
        forged.cic = second.token().cic.clone();
        let err = PkTokenVerifier::new(&issuer).verify_token(&forged).unwrap_err();
        assert!(matches!(err, IdentityError::AudienceMismatch { .. }), "{err}");
    }

    #[test]
    fn message_signed_by_other_session_is_rejected() {
        let issuer = issuer();
        let first = EphemeralSigner::new(&issuer).authenticate().unwrap();
        let second = EphemeralSigner::new(&issuer).authenticate().unwrap();
        let signed = second.sign(b"m").unwrap();
        assert!(verify_signed_message(first.token(), &signed).is_err());
    }
}
