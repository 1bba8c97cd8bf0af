//! Resolves the previous attestation of a monitoring job.
//!
//! A job is identified by repository, workflow file and branch, all taken
//! from the workflow reference claim of the current identity token:
//!
//! ```text
//! owner/repo/.github/workflows/file.yml@refs/heads/branch
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};
use url_oracle_canonical::{Canonicalizer, Digest};

use crate::errors::ChainError;
use crate::payload::{Attestation, AttestationDetails};

/// Repository, workflow file and branch of a monitoring job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Workflow file name under `.github/workflows/`.
    pub workflow_file: String,
    /// Branch the job ran on.
    pub branch: String,
}

impl JobIdentity {
    /// Decomposes a workflow reference.
    ///
    /// Anything that is not exactly
    /// `owner/repo/.github/workflows/file@refs/heads/branch` is rejected.
    pub fn parse(workflow_ref: &str) -> Result<Self, ChainError> {
        let malformed = |reason| ChainError::MalformedWorkflowRef {
            value: workflow_ref.to_string(),
            reason,
        };

        let (path, git_ref) = workflow_ref
            .split_once('@')
            .ok_or_else(|| malformed("missing `@` between workflow path and ref"))?;
        if git_ref.contains('@') {
            return Err(malformed("more than one `@`"));
        }

        let path: Vec<&str> = path.split('/').collect();
        let [owner, repo, dot_github, workflows, workflow_file] = path.as_slice() else {
            return Err(malformed("path must be owner/repo/.github/workflows/file"));
        };
        if *dot_github != ".github" || *workflows != "workflows" {
            return Err(malformed("workflow file must live under .github/workflows"));
        }

        let git_ref: Vec<&str> = git_ref.split('/').collect();
        let ["refs", "heads", branch] = git_ref.as_slice() else {
            return Err(malformed("ref must be refs/heads/<branch>"));
        };

        if [owner, repo, workflow_file, branch].iter().any(|s| s.is_empty()) {
            return Err(malformed("empty segment"));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            workflow_file: workflow_file.to_string(),
            branch: branch.to_string(),
        })
    }

    /// `owner/repo`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// The workflow reference this identity was parsed from.
    pub fn workflow_ref(&self) -> String {
        format!(
            "{}/{}/.github/workflows/{}@refs/heads/{}",
            self.owner, self.repo, self.workflow_file, self.branch
        )
    }
}

impl FromStr for JobIdentity {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.workflow_ref())
    }
}

/// A previous artifact as retrieved from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousArtifact {
    /// The full previous attestation; its digest is recomputed.
    Attestation {
        /// The attestation.
        attestation: Box<Attestation>,
        /// Where it was retrieved from.
        locator: String,
    },
    /// Only the chain pointer of the previous attestation.
    Details(AttestationDetails),
}

/// Outcome of an artifact store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLookup {
    /// The most recent artifact of the job.
    Found(PreviousArtifact),
    /// The job has never produced an attestation.
    NotFound,
}

/// Source of previous attestations.
pub trait ArtifactStore {
    /// Looks up the most recent successful attestation of `job`.
    ///
    /// Absence is [`ArtifactLookup::NotFound`]; only operational failures
    /// are errors.
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError> {
        (**self).latest(job)
    }
}

/// Result of chain linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLink {
    /// A predecessor exists.
    Found(AttestationDetails),
    /// This is the first attestation of the job.
    NotFound,
}

impl ChainLink {
    /// Digest to embed as `previous_attestation_digest`.
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Found(details) => Some(&details.digest),
            Self::NotFound => None,
        }
    }
}

/// Links a new attestation to its job's predecessor.
pub struct ChainLinker<S> {
    store: S,
    canonicalizer: Canonicalizer,
}

impl<S: ArtifactStore> ChainLinker<S> {
    /// Linker over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Resolves the predecessor of the job named by `workflow_ref`.
    pub fn link(&self, workflow_ref: &str) -> Result<ChainLink, ChainError> {
        let job = JobIdentity::parse(workflow_ref)?;
        debug!(%job, "looking up previous attestation");

        let previous = match self.store.latest(&job)? {
            ArtifactLookup::NotFound => {
                info!(%job, "no previous attestation; starting a new chain");
                return Ok(ChainLink::NotFound);
            }
            ArtifactLookup::Found(previous) => previous,
        };

        let details = match previous {
            PreviousArtifact::Details(details) => details,
            PreviousArtifact::Attestation {
                attestation,
                locator,
            } => {
                if let Some(previous_ref) = &attestation.payload.workflow_ref {
                    if previous_ref != workflow_ref {
                        warn!(
                            previous = %previous_ref,
                            current = %workflow_ref,
                            "previous attestation was produced by a different workflow"
                        );
                    }
                }
                AttestationDetails {
                    digest: attestation.payload.digest(&self.canonicalizer)?,
                    artifact_locator: locator,
                }
            }
        };

        info!(%job, digest = %details.digest, locator = %details.artifact_locator, "linked to previous attestation");
        Ok(ChainLink::Found(details))
    }
}
