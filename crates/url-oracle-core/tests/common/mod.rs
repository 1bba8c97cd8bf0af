#![allow(dead_code)]

use std::cell::RefCell;

use url_oracle_core::{
    ArtifactLookup, ArtifactStore, ChainError, ContentFetcher, EphemeralSigner, FetchError,
    FetchedContent, JobIdentity, LocalIssuer, PkTokenVerifier, PreviousArtifact, Verifier,
};

pub const ISSUER: &str = "https://token.actions.githubusercontent.com";
pub const WORKFLOW_REF: &str =
    "kipz/url-oracle/.github/workflows/create-attestation.yml@refs/heads/main";
pub const COMMIT: &str = "abc123";
pub const REPOSITORY: &str = "kipz/url-oracle";
pub const ISSUED_AT: i64 = 1_704_067_200;

pub fn issuer() -> LocalIssuer {
    LocalIssuer::from_seed(ISSUER, [42u8; 32])
        .with_claim("job_workflow_sha", COMMIT)
        .with_claim("job_workflow_ref", WORKFLOW_REF)
        .with_claim("repository", REPOSITORY)
        .with_claim("iat", ISSUED_AT)
}

pub fn signer() -> EphemeralSigner<LocalIssuer> {
    EphemeralSigner::new(issuer())
}

pub fn verifier() -> Verifier<PkTokenVerifier<LocalIssuer>> {
    Verifier::new(PkTokenVerifier::new(issuer()))
}

/// Serves whatever body it currently holds for every URL.
pub struct StaticFetcher {
    body: RefCell<Vec<u8>>,
}

impl StaticFetcher {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: RefCell::new(body.to_vec()),
        }
    }

    pub fn set(&self, body: &[u8]) {
        *self.body.borrow_mut() = body.to_vec();
    }
}

impl ContentFetcher for StaticFetcher {
    fn fetch(&self, _url: &str) -> Result<FetchedContent, FetchError> {
        Ok(FetchedContent::from_bytes(self.body.borrow().clone()))
    }
}

pub struct FailingFetcher;

impl ContentFetcher for FailingFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

/// In-memory artifact store that records the jobs it was asked about.
#[derive(Default)]
pub struct MemoryStore {
    pub latest: RefCell<Option<PreviousArtifact>>,
    pub broken: bool,
    pub queries: RefCell<Vec<JobIdentity>>,
}

impl MemoryStore {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn holding(previous: PreviousArtifact) -> Self {
        Self {
            latest: RefCell::new(Some(previous)),
            ..Self::default()
        }
    }

    pub fn put(&self, previous: PreviousArtifact) {
        *self.latest.borrow_mut() = Some(previous);
    }
}

impl ArtifactStore for MemoryStore {
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError> {
        self.queries.borrow_mut().push(job.clone());
        if self.broken {
            return Err(ChainError::Lookup {
                store: "memory",
                reason: "store unreachable".to_string(),
            });
        }
        Ok(match self.latest.borrow().clone() {
            Some(previous) => ArtifactLookup::Found(previous),
            None => ArtifactLookup::NotFound,
        })
    }
}
