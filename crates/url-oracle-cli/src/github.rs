//! GitHub Actions OIDC provider.
//!
//! Tokens are requested from the runner's token endpoint with the bearer
//! credential the runner exposes, and verified against the issuer's JWKS.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;
use url_oracle_core::{IdentityError, OidcProvider};

/// Issuer of GitHub Actions ID tokens.
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Where the runner serves ID tokens.
#[derive(Debug, Clone)]
pub struct ActionsTokenRequest {
    /// `ACTIONS_ID_TOKEN_REQUEST_URL`.
    pub url: String,
    /// `ACTIONS_ID_TOKEN_REQUEST_TOKEN`.
    pub bearer: String,
}

/// Where verification keys come from.
#[derive(Debug, Clone)]
pub enum JwksSource {
    /// `<issuer>/.well-known/jwks`.
    Issuer,
    /// A local JWKS document.
    File(PathBuf),
}

/// OIDC provider for GitHub Actions (or any issuer publishing a JWKS).
pub struct GithubActionsProvider {
    issuer: String,
    request: Option<ActionsTokenRequest>,
    jwks_source: JwksSource,
    jwks: OnceCell<JwkSet>,
    client: reqwest::blocking::Client,
}

impl GithubActionsProvider {
    /// Provider for `issuer`. `request` is only needed to obtain tokens.
    pub fn new(
        issuer: impl Into<String>,
        request: Option<ActionsTokenRequest>,
        jwks_source: JwksSource,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("url-oracle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IdentityError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            issuer: issuer.into(),
            request,
            jwks_source,
            jwks: OnceCell::new(),
            client,
        })
    }

    fn jwks(&self) -> Result<&JwkSet, IdentityError> {
        if let Some(jwks) = self.jwks.get() {
            return Ok(jwks);
        }
        let jwks = self.load_jwks()?;
        Ok(self.jwks.get_or_init(|| jwks))
    }

    fn load_jwks(&self) -> Result<JwkSet, IdentityError> {
        match &self.jwks_source {
            JwksSource::File(path) => {
                debug!(path = %path.display(), "loading JWKS from file");
                let bytes = std::fs::read(path).map_err(|e| {
                    IdentityError::Provider(format!("cannot read JWKS {}: {e}", path.display()))
                })?;
                serde_json::from_slice(&bytes)
                    .map_err(|e| IdentityError::Provider(format!("invalid JWKS {}: {e}", path.display())))
            }
            JwksSource::Issuer => {
                let url = format!("{}/.well-known/jwks", self.issuer.trim_end_matches('/'));
                debug!(%url, "fetching issuer JWKS");
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| IdentityError::Provider(format!("cannot fetch JWKS from {url}: {e}")))?;
                response
                    .json()
                    .map_err(|e| IdentityError::Provider(format!("invalid JWKS from {url}: {e}")))
            }
        }
    }
}

impl OidcProvider for GithubActionsProvider {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    fn request_id_token(&self, audience: &str) -> Result<String, IdentityError> {
        let request = self.request.as_ref().ok_or_else(|| {
            IdentityError::Provider(
                "ACTIONS_ID_TOKEN_REQUEST_URL and ACTIONS_ID_TOKEN_REQUEST_TOKEN must be set"
                    .to_string(),
            )
        })?;
        let mut url = Url::parse(&request.url)
            .map_err(|e| IdentityError::Provider(format!("invalid token request URL: {e}")))?;
        url.query_pairs_mut().append_pair("audience", audience);

        let response = self
            .client
            .get(url)
            .bearer_auth(&request.bearer)
            .send()
            .map_err(|e| IdentityError::Provider(format!("token request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected(format!(
                "token endpoint answered {status}"
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| IdentityError::Malformed(format!("token response is not JSON: {e}")))?;
        let token = body
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| IdentityError::Malformed("token response has no `value`".to_string()))?;
        info!(issuer = %self.issuer, "received GitHub Actions ID token");
        Ok(token.to_string())
    }

    /// Checks the signature only; `iss` and `aud` are compared by the caller.
    fn verify_id_token(&self, id_token: &str) -> Result<Map<String, Value>, IdentityError> {
        let header =
            decode_header(id_token).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        if !matches!(header.alg, Algorithm::RS256 | Algorithm::EdDSA) {
            return Err(IdentityError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let jwks = self.jwks()?;
        let jwk = match &header.kid {
            Some(kid) => jwks.find(kid),
            None => jwks.keys.first(),
        }
        .ok_or_else(|| {
            IdentityError::Key(format!(
                "no JWKS key for kid {}",
                header.kid.as_deref().unwrap_or("<none>")
            ))
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::Key(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<Map<String, Value>>(id_token, &key, &validation)
            .map_err(|e| IdentityError::InvalidSignature(e.to_string()))?;
        Ok(data.claims)
    }
}
