//! Previous-artifact stores.
//!
//! [`DirectoryArtifactStore`] reads a local directory that holds the last
//! attestation of a single job. [`CommandArtifactStore`] runs an external
//! download script that fills such a directory:
//!
//! ```text
//! <script> <owner/repo> <workflow-file> <branch> <output-dir>
//!   exit 0  artifact downloaded into <output-dir>
//!   exit 3  no artifact exists for the job
//!   other   operational failure
//! ```
//!
//! Artifact files already in `<output-dir>` are removed before the script runs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use url_oracle_core::{ArtifactLookup, ArtifactStore, ChainError, JobIdentity, PreviousArtifact};

use crate::files::{read_attestation, read_details, ATTESTATION_FILE, DETAILS_FILE};

/// Exit code the download script uses for "no artifact".
pub const EXIT_NOT_FOUND: i32 = 3;

/// Interpretation of the download script's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactExit {
    /// Exit 0: the artifact was written to the output directory.
    Downloaded,
    /// Exit 3: the job has no previous artifact.
    NotFound,
    /// Any other code, or termination by signal (`None`).
    Failed(Option<i32>),
}

impl ArtifactExit {
    /// Classifies a process exit code.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Downloaded,
            Some(EXIT_NOT_FOUND) => Self::NotFound,
            other => Self::Failed(other),
        }
    }
}

/// Store backed by a directory holding one job's last artifact.
///
/// The directory is assumed to belong to the job being linked, so the job
/// identity is not consulted.
#[derive(Debug, Clone)]
pub struct DirectoryArtifactStore {
    dir: PathBuf,
}

impl DirectoryArtifactStore {
    /// Store over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory read by this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for DirectoryArtifactStore {
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError> {
        let lookup_error = |e: crate::StoreError| ChainError::Lookup {
            store: "directory",
            reason: e.to_string(),
        };

        let attestation_path = self.dir.join(ATTESTATION_FILE);
        if attestation_path.is_file() {
            let attestation = read_attestation(&attestation_path).map_err(lookup_error)?;
            debug!(%job, path = %attestation_path.display(), "found previous attestation");
            return Ok(ArtifactLookup::Found(PreviousArtifact::Attestation {
                attestation: Box::new(attestation),
                locator: attestation_path.display().to_string(),
            }));
        }

        let details_path = self.dir.join(DETAILS_FILE);
        if details_path.is_file() {
            let details = read_details(&details_path).map_err(lookup_error)?;
            debug!(%job, path = %details_path.display(), "found previous chain pointer");
            return Ok(ArtifactLookup::Found(PreviousArtifact::Details(details)));
        }

        debug!(%job, dir = %self.dir.display(), "no previous artifact in directory");
        Ok(ArtifactLookup::NotFound)
    }
}

/// Store that delegates retrieval to an external script.
#[derive(Debug, Clone)]
pub struct CommandArtifactStore {
    script: PathBuf,
    output_dir: PathBuf,
}

impl CommandArtifactStore {
    /// Store running `script`, which downloads into `output_dir`.
    pub fn new(script: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Removes artifacts left in the output directory by an earlier run, so
    /// only what the script writes now can be linked.
    fn clear_stale(&self) -> Result<(), ChainError> {
        for name in [ATTESTATION_FILE, DETAILS_FILE] {
            let path = self.output_dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(self.failure(format!("cannot remove {}: {e}", path.display())))
                }
            }
        }
        Ok(())
    }

    fn failure(&self, reason: impl Into<String>) -> ChainError {
        ChainError::Lookup {
            store: "command",
            reason: format!("{}: {}", self.script.display(), reason.into()),
        }
    }
}

impl ArtifactStore for CommandArtifactStore {
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            self.failure(format!("cannot create {}: {e}", self.output_dir.display()))
        })?;
        self.clear_stale()?;

        info!(%job, script = %self.script.display(), "running artifact download script");
        let output = Command::new(&self.script)
            .arg(job.repository())
            .arg(&job.workflow_file)
            .arg(&job.branch)
            .arg(&self.output_dir)
            .output()
            .map_err(|e| self.failure(format!("failed to start: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "artifact script stderr");
        }

        match ArtifactExit::from_code(output.status.code()) {
            ArtifactExit::Downloaded => {
                match DirectoryArtifactStore::new(&self.output_dir).latest(job)? {
                    ArtifactLookup::NotFound => Err(self.failure(format!(
                        "exited 0 but {} holds no {ATTESTATION_FILE} or {DETAILS_FILE}",
                        self.output_dir.display()
                    ))),
                    found => Ok(found),
                }
            }
            ArtifactExit::NotFound => {
                info!(%job, "artifact script reports no previous artifact");
                Ok(ArtifactLookup::NotFound)
            }
            ArtifactExit::Failed(Some(code)) => {
                Err(self.failure(format!("exited with code {code}: {}", stderr.trim())))
            }
            ArtifactExit::Failed(None) => Err(self.failure("terminated by signal")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_classified() {
        assert_eq!(ArtifactExit::from_code(Some(0)), ArtifactExit::Downloaded);
        assert_eq!(ArtifactExit::from_code(Some(3)), ArtifactExit::NotFound);
        assert_eq!(ArtifactExit::from_code(Some(1)), ArtifactExit::Failed(Some(1)));
        assert_eq!(ArtifactExit::from_code(Some(4)), ArtifactExit::Failed(Some(4)));
        assert_eq!(ArtifactExit::from_code(None), ArtifactExit::Failed(None));
    }
}
