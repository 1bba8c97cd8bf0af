//! Inspect command implementation.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};
use url_oracle_canonical::Canonicalizer;
use url_oracle_core::claims::{CLAIM_ISSUED_AT, CLAIM_REPOSITORY, CLAIM_WORKFLOW_REF, CLAIM_WORKFLOW_SHA};
use url_oracle_store::read_attestation;

use crate::output::{format_field, format_json, truncate};

pub fn run(attestation: PathBuf, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let record = read_attestation(&attestation)
        .map_err(|e| format!("Failed to read attestation: {}", e))?;
    let payload = &record.payload;
    let digest = payload.digest(&Canonicalizer::default())?;
    let claims = record
        .identity_token
        .unverified_claims()
        .map_err(|e| format!("Failed to decode identity token: {}", e))?;

    if json_output {
        println!(
            "{}",
            format_json(&json!({
                "schema_version": payload.schema_version.as_u32(),
                "url": payload.url,
                "timestamp": payload.timestamp,
                "commit_sha": payload.commit_sha,
                "workflow_ref": payload.workflow_ref,
                "content_digest": payload.content_digest,
                "content_size": payload.content_size,
                "content_consistent": payload.content_is_consistent(),
                "previous_attestation_digest": payload.previous_attestation_digest,
                "payload_digest": digest,
                "claims": claims,
                "ephemeral_key": record.identity_token.cic.upk,
            }))
        );
        return Ok(());
    }

    let claim = |name: &str| claims.get(name).map(display_claim).unwrap_or_else(|| "-".to_string());

    println!("Payload");
    println!("{}", format_field("  Schema version", &payload.schema_version.as_u32().to_string()));
    println!("{}", format_field("  URL", &payload.url));
    println!("{}", format_field("  Timestamp", payload.timestamp.as_str()));
    println!("{}", format_field("  Commit", &payload.commit_sha));
    println!("{}", format_field("  Workflow ref", payload.workflow_ref.as_deref().unwrap_or("-")));
    println!("{}", format_field("  Content digest", &payload.content_digest.to_string()));
    println!("{}", format_field("  Content size", &payload.content_size.to_string()));
    if !payload.content_is_consistent() {
        println!("{}", format_field("  WARNING", "stored digest/size do not match content"));
    }
    println!(
        "{}",
        format_field(
            "  Previous",
            &payload
                .previous_attestation_digest
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        )
    );
    println!("{}", format_field("  Payload digest", &digest.to_string()));
    println!();
    println!("Identity token (unverified)");
    println!("{}", format_field("  Issuer", &claim("iss")));
    println!("{}", format_field("  Subject", &claim("sub")));
    println!("{}", format_field("  Repository", &claim(CLAIM_REPOSITORY)));
    println!("{}", format_field("  Workflow ref", &claim(CLAIM_WORKFLOW_REF)));
    println!("{}", format_field("  Workflow commit", &claim(CLAIM_WORKFLOW_SHA)));
    println!("{}", format_field("  Issued at", &claim_time(claims.get(CLAIM_ISSUED_AT))));
    println!("{}", format_field("  Expires", &claim_time(claims.get("exp"))));
    println!("{}", format_field("  Ephemeral key", &record.identity_token.cic.upk));
    println!("{}", format_field("  Signature", &truncate(&String::from_utf8_lossy(&record.signature), 60)));
    Ok(())
}

fn display_claim(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn claim_time(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}
