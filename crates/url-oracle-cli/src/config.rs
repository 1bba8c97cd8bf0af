//! Command-line configuration.
//!
//! Environment variables are read here, through clap, and nowhere else.

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use url_oracle_core::{ArtifactLookup, ArtifactStore, ChainError, JobIdentity, VerifyContext};
use url_oracle_store::{CommandArtifactStore, DirectoryArtifactStore};

use crate::github::{ActionsTokenRequest, GithubActionsProvider, JwksSource, GITHUB_ACTIONS_ISSUER};

/// Configuration that cannot be satisfied from flags and environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "ACTIONS_ID_TOKEN_REQUEST_URL and ACTIONS_ID_TOKEN_REQUEST_TOKEN must be set \
         (run inside GitHub Actions with `id-token: write`)"
    )]
    MissingRunnerCredentials,
}

/// Which OIDC issuer to trust and where its keys come from.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// OIDC issuer URL
    #[arg(long, env = "URL_ORACLE_ISSUER", default_value = GITHUB_ACTIONS_ISSUER)]
    pub issuer: String,
    /// Local JWKS file to use instead of fetching <issuer>/.well-known/jwks
    #[arg(long)]
    pub jwks: Option<PathBuf>,
}

impl ProviderArgs {
    pub fn jwks_source(&self) -> JwksSource {
        match &self.jwks {
            Some(path) => JwksSource::File(path.clone()),
            None => JwksSource::Issuer,
        }
    }

    /// Provider that can only verify tokens.
    pub fn verifying_provider(&self) -> Result<GithubActionsProvider, Box<dyn std::error::Error>> {
        Ok(GithubActionsProvider::new(&self.issuer, None, self.jwks_source())?)
    }
}

/// Runner credentials for requesting ID tokens.
#[derive(Args, Debug, Clone)]
pub struct ActionsArgs {
    /// Token request endpoint of the runner
    #[arg(long, env = "ACTIONS_ID_TOKEN_REQUEST_URL", hide_env_values = true)]
    pub token_request_url: Option<String>,
    /// Bearer credential for the token request endpoint
    #[arg(long, env = "ACTIONS_ID_TOKEN_REQUEST_TOKEN", hide_env_values = true)]
    pub token_request_token: Option<String>,
}

impl ActionsArgs {
    pub fn token_request(&self) -> Result<ActionsTokenRequest, ConfigError> {
        match (&self.token_request_url, &self.token_request_token) {
            (Some(url), Some(bearer)) if !url.is_empty() && !bearer.is_empty() => {
                Ok(ActionsTokenRequest {
                    url: url.clone(),
                    bearer: bearer.clone(),
                })
            }
            _ => Err(ConfigError::MissingRunnerCredentials),
        }
    }
}

/// Optional expectations checked during verification.
#[derive(Args, Debug, Clone, Default)]
pub struct ExpectationArgs {
    /// Workflow reference the identity token must carry
    #[arg(long, env = "URL_ORACLE_WORKFLOW_REF")]
    pub workflow_ref: Option<String>,
    /// Current commit the token's workflow commit must equal
    #[arg(long)]
    pub commit_sha: Option<String>,
    /// owner/repo the identity token must have been issued to
    #[arg(long, env = "URL_ORACLE_REPOSITORY")]
    pub oracle_repository: Option<String>,
}

impl From<ExpectationArgs> for VerifyContext {
    fn from(args: ExpectationArgs) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        VerifyContext {
            expected_workflow_ref: non_empty(args.workflow_ref),
            current_commit_sha: non_empty(args.commit_sha),
            oracle_repository: non_empty(args.oracle_repository),
        }
    }
}

/// Where the previous attestation of the job comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Directory holding the previous attestation.json or attestation-details.json (takes precedence over --artifact-script)
    #[arg(long)]
    pub previous_dir: Option<PathBuf>,
    /// Script that downloads the previous artifact: <owner/repo> <workflow-file> <branch> <output-dir>
    #[arg(long, env = "URL_ORACLE_ARTIFACT_SCRIPT")]
    pub artifact_script: Option<PathBuf>,
    /// Directory the artifact script downloads into
    #[arg(long, default_value = "previous-attestation")]
    pub artifact_dir: PathBuf,
}

impl StoreArgs {
    pub fn store(&self) -> SelectedStore {
        if let Some(dir) = &self.previous_dir {
            SelectedStore::Directory(DirectoryArtifactStore::new(dir))
        } else if let Some(script) = &self.artifact_script {
            SelectedStore::Command(CommandArtifactStore::new(script, &self.artifact_dir))
        } else {
            SelectedStore::Unconfigured
        }
    }
}

/// The artifact store chosen on the command line.
pub enum SelectedStore {
    Directory(DirectoryArtifactStore),
    Command(CommandArtifactStore),
    Unconfigured,
}

impl ArtifactStore for SelectedStore {
    fn latest(&self, job: &JobIdentity) -> Result<ArtifactLookup, ChainError> {
        match self {
            Self::Directory(store) => store.latest(job),
            Self::Command(store) => store.latest(job),
            Self::Unconfigured => Err(ChainError::Lookup {
                store: "unconfigured",
                reason: format!(
                    "no artifact store configured for {job}; pass --previous-dir, \
                     --artifact-script or --skip-chain-link"
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expectations_are_unconfigured() {
        let context = VerifyContext::from(ExpectationArgs {
            workflow_ref: Some(String::new()),
            commit_sha: None,
            oracle_repository: Some("kipz/url-oracle".to_string()),
        });
        assert_eq!(context.expected_workflow_ref, None);
        assert_eq!(context.current_commit_sha, None);
        assert_eq!(context.oracle_repository.as_deref(), Some("kipz/url-oracle"));
    }

    #[test]
    fn runner_credentials_need_both_values() {
        let partial = ActionsArgs {
            token_request_url: Some("https://runner.test/token".to_string()),
            token_request_token: None,
        };
        assert!(matches!(
            partial.token_request(),
            Err(ConfigError::MissingRunnerCredentials)
        ));

        let complete = ActionsArgs {
            token_request_token: Some("secret".to_string()),
            ..partial
        };
        assert_eq!(complete.token_request().unwrap().bearer, "secret");
    }

    #[test]
    fn previous_dir_wins_over_script() {
        let args = StoreArgs {
            previous_dir: Some(PathBuf::from("prev")),
            artifact_script: Some(PathBuf::from("fetch.sh")),
            artifact_dir: PathBuf::from("out"),
        };
        assert!(matches!(args.store(), SelectedStore::Directory(_)));
        assert!(matches!(StoreArgs::default().store(), SelectedStore::Unconfigured));
    }

    #[test]
    fn unconfigured_store_refuses_to_start_a_new_chain() {
        let job = JobIdentity::parse(
            "kipz/url-oracle/.github/workflows/create-attestation.yml@refs/heads/main",
        )
        .unwrap();
        let err = StoreArgs::default().store().latest(&job).unwrap_err();
        assert!(matches!(err, ChainError::Lookup { store: "unconfigured", .. }));
        assert!(err.to_string().contains("--skip-chain-link"));
    }
}
