//! Compact JWS (`header.payload.signature`) with EdDSA.
//!
//! Envelope for the message signed by the ephemeral key. Its payload is the
//! raw payload digest rather than a JSON claim set, so ID tokens go through
//! `jsonwebtoken` instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::{Map, Value};

use crate::errors::IdentityError;

/// JOSE name of Ed25519 signatures.
pub const EDDSA: &str = "EdDSA";

/// Signs `payload` and returns the compact serialization.
pub fn sign_compact(
    header: &Value,
    payload: &[u8],
    key: &SigningKey,
) -> Result<String, IdentityError> {
    let header_bytes =
        serde_json::to_vec(header).map_err(|e| IdentityError::Malformed(e.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_bytes),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// A parsed, not yet verified, compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws {
    /// Decoded protected header.
    pub header: Map<String, Value>,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
    signing_input: String,
    signature: Vec<u8>,
}

impl CompactJws {
    /// Splits and decodes a compact JWS without checking its signature.
    pub fn parse(token: &str) -> Result<Self, IdentityError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(IdentityError::Malformed(
                "compact JWS must have exactly three segments".to_string(),
            ));
        };

        let header_bytes = decode_segment(header_b64, "header")?;
        let header: Map<String, Value> = serde_json::from_slice(&header_bytes)
            .map_err(|e| IdentityError::Malformed(format!("JWS header is not a JSON object: {e}")))?;

        Ok(Self {
            header,
            payload: decode_segment(payload_b64, "payload")?,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature: decode_segment(signature_b64, "signature")?,
        })
    }

    /// The `alg` header, if present.
    pub fn alg(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// Verifies an EdDSA signature under `key`.
    pub fn verify_eddsa(&self, key: &VerifyingKey) -> Result<(), IdentityError> {
        match self.alg() {
            Some(EDDSA) => {}
            other => {
                return Err(IdentityError::UnsupportedAlgorithm(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        }
        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| IdentityError::InvalidSignature(e.to_string()))?;
        key.verify(self.signing_input.as_bytes(), &signature)
            .map_err(|e| IdentityError::InvalidSignature(e.to_string()))
    }

}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, IdentityError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| IdentityError::Malformed(format!("JWS {name} is not base64url")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use serde_json::json;

    #[test]
    fn sign_then_verify_recovers_payload() {
        let key = SigningKey::generate(&mut OsRng);
        let token = sign_compact(&json!({"alg": EDDSA}), b"message", &key).unwrap();
        let jws = CompactJws::parse(&token).unwrap();
        jws.verify_eddsa(&key.verifying_key()).unwrap();
        assert_eq!(jws.payload, b"message");
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let token = sign_compact(&json!({"alg": EDDSA}), b"message", &key).unwrap();
        let jws = CompactJws::parse(&token).unwrap();
        assert!(matches!(
            jws.verify_eddsa(&other.verifying_key()),
            Err(IdentityError::InvalidSignature(_))
        ));
    }

    #[test]
    fn foreign_algorithms_are_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let token = sign_compact(&json!({"alg": "none"}), b"m", &key).unwrap();
        let jws = CompactJws::parse(&token).unwrap();
        assert!(matches!(
            jws.verify_eddsa(&key.verifying_key()),
            Err(IdentityError::UnsupportedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn segment_count_is_enforced() {
        assert!(CompactJws::parse("a.b").is_err());
        assert!(CompactJws::parse("a.b.c.d").is_err());
    }
}
