//! Verify command implementation.

use std::path::PathBuf;

use serde_json::json;
use url_oracle_core::{PkTokenVerifier, Verifier, VerifyContext};
use url_oracle_store::read_attestation;

use crate::config::{ExpectationArgs, ProviderArgs};
use crate::output::{format_check, format_json};

pub fn run(
    attestation: PathBuf,
    json_output: bool,
    provider: ProviderArgs,
    expectations: ExpectationArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = read_attestation(&attestation)
        .map_err(|e| format!("Failed to read attestation: {}", e))?;
    let context = VerifyContext::from(expectations);

    let verifier = Verifier::new(PkTokenVerifier::new(provider.verifying_provider()?));
    let result = verifier.verify(&record, &context);

    if json_output {
        println!(
            "{}",
            format_json(&json!({
                "attestation": attestation.display().to_string(),
                "passed": result.passed(),
                "checks": result.checks,
            }))
        );
    } else {
        println!("Verifying {}", attestation.display());
        for check in &result.checks {
            println!("{}", format_check(check));
        }
        println!();
        if result.passed() {
            println!("PASSED ({})", result.summary());
        } else {
            println!("FAILED ({})", result.summary());
        }
    }

    if !result.passed() {
        std::process::exit(1);
    }
    Ok(())
}
