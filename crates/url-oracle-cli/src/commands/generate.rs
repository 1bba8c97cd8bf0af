//! Generate command implementation.

use std::path::PathBuf;

use tracing::info;
use url_oracle_canonical::Canonicalizer;
use url_oracle_core::{AttestationBuilder, AttestationDetails, EphemeralSigner};
use url_oracle_store::{write_attestation, write_details};

use crate::config::{ActionsArgs, ProviderArgs, StoreArgs};
use crate::fetch::HttpFetcher;
use crate::github::GithubActionsProvider;
use crate::output::format_field;

pub fn run(
    url: String,
    output: PathBuf,
    details: Option<PathBuf>,
    skip_chain_link: bool,
    provider: ProviderArgs,
    actions: ActionsArgs,
    store: StoreArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = actions.token_request()?;
    let provider = GithubActionsProvider::new(&provider.issuer, Some(request), provider.jwks_source())?;
    let fetcher = HttpFetcher::new()?;

    let builder = AttestationBuilder::new(fetcher, EphemeralSigner::new(provider), store.store());
    let attestation = builder.build(&url, skip_chain_link)?;

    write_attestation(&output, &attestation)
        .map_err(|e| format!("Failed to write attestation: {}", e))?;
    let digest = attestation.payload.digest(&Canonicalizer::default())?;
    info!(path = %output.display(), %digest, "attestation written");

    if let Some(details_path) = details {
        let pointer = AttestationDetails {
            digest: digest.clone(),
            artifact_locator: output.display().to_string(),
        };
        write_details(&details_path, &pointer)
            .map_err(|e| format!("Failed to write attestation details: {}", e))?;
    }

    println!("{}", format_field("Attestation", &output.display().to_string()));
    println!("{}", format_field("URL", &attestation.payload.url));
    println!("{}", format_field("Content digest", &attestation.payload.content_digest.to_string()));
    println!("{}", format_field("Payload digest", &digest.to_string()));
    println!(
        "{}",
        format_field(
            "Previous",
            &attestation
                .payload
                .previous_attestation_digest
                .as_ref()
                .map_or_else(|| "none (first in chain)".to_string(), ToString::to_string),
        )
    );
    Ok(())
}
