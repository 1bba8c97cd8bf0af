//! Attestation builder.
//!
//! ```text
//! fetch(url) -> authenticate -> extract_claims -> link (unless skipped)
//!     -> build payload -> digest -> sign(digest bytes)
//! ```
//!
//! Every failure aborts the build; no partial attestation is returned.

use tracing::{info, instrument};
use url_oracle_canonical::{Canonicalizer, HashError};

use crate::chain::{ArtifactStore, ChainLink, ChainLinker};
use crate::claims::extract_claims;
use crate::errors::{BuildError, PayloadError};
use crate::fetch::ContentFetcher;
use crate::payload::{Attestation, AttestationPayload, PayloadFields, SchemaVersion};
use crate::signer::IdentitySigner;

/// Produces signed attestations of a URL's content.
pub struct AttestationBuilder<F, S, A> {
    fetcher: F,
    signer: S,
    store: A,
    schema_version: SchemaVersion,
    canonicalizer: Canonicalizer,
}

impl<F, S, A> AttestationBuilder<F, S, A>
where
    F: ContentFetcher,
    S: IdentitySigner,
    A: ArtifactStore,
{
    /// Builder from its three collaborators.
    pub fn new(fetcher: F, signer: S, store: A) -> Self {
        Self {
            fetcher,
            signer,
            store,
            schema_version: SchemaVersion::CURRENT,
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Overrides the payload layout. New attestations should use
    /// [`SchemaVersion::CURRENT`]; older layouts exist for compatibility.
    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }

    /// Builds and signs an attestation of the content at `url`.
    #[instrument(skip(self), fields(schema = self.schema_version.as_u32()))]
    pub fn build(&self, url: &str, skip_chain_link: bool) -> Result<Attestation, BuildError> {
        let fetched = self.fetcher.fetch(url).map_err(BuildError::Fetch)?;
        info!(size = fetched.size, digest = %fetched.digest, "fetched content");

        let session = self
            .signer
            .authenticate()
            .map_err(BuildError::Authentication)?;
        let claims = extract_claims(session.token()).map_err(BuildError::Claims)?;
        info!(
            commit = %claims.commit_sha,
            workflow_ref = %claims.workflow_ref,
            timestamp = %claims.timestamp,
            "authenticated"
        );

        let link = if skip_chain_link {
            info!("chain linking skipped");
            ChainLink::NotFound
        } else {
            ChainLinker::new(&self.store)
                .link(&claims.workflow_ref)
                .map_err(BuildError::ChainLink)?
        };

        let payload = AttestationPayload::build(PayloadFields {
            schema_version: self.schema_version,
            commit_sha: claims.commit_sha,
            timestamp: claims.timestamp,
            url: url.to_string(),
            content: fetched.bytes,
            previous_attestation_digest: link.digest().cloned(),
            workflow_ref: Some(claims.workflow_ref),
        })?;
        if payload.content_digest != fetched.digest || payload.content_size != fetched.size {
            return Err(BuildError::ContentDigestMismatch {
                reported: fetched.digest.to_string(),
                computed: payload.content_digest.to_string(),
            });
        }

        let digest = payload.digest(&self.canonicalizer)?;
        let message = digest
            .to_bytes()
            .map_err(|e| PayloadError::Hash(HashError::from(e)))?;
        let signature = session.sign(&message).map_err(BuildError::Signing)?;
        info!(%digest, "signed payload digest");

        Ok(Attestation {
            payload,
            identity_token: session.into_token(),
            signature,
        })
    }
}
