//! Canonicalize command implementation.

use std::io::{self, Read, Write};

use serde_json::Value;
use url_oracle_canonical::Canonicalizer;
use url_oracle_core::AttestationPayload;

pub fn run(input: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let json_str = if let Some(path) = input {
        std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read file {}: {}", path, e))?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let mut value: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("Invalid JSON: {}", e))?;
    // Accept a whole attestation as well as a bare payload.
    if let Some(payload) = value.get_mut("payload") {
        value = payload.take();
    }
    let payload: AttestationPayload =
        serde_json::from_value(value).map_err(|e| format!("Invalid payload: {}", e))?;

    let bytes = payload
        .canonical_hash_input(&Canonicalizer::default())
        .map_err(|e| format!("Canonicalization failed: {}", e))?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
