mod common;

use common::*;
use url_oracle_core::{
    Attestation, AttestationBuilder, CheckKind, CheckResultStatus, LocalIssuer,
    PkTokenVerifier, SchemaVersion, Verifier, VerifyContext,
};

const URL: &str = "https://example.com/a.json";

fn build(body: &[u8]) -> Attestation {
    let fetcher = StaticFetcher::new(body);
    let signer = signer();
    let store = MemoryStore::default();
    AttestationBuilder::new(&fetcher, &signer, &store)
        .build(URL, false)
        .unwrap()
}

fn status(result: &url_oracle_core::VerificationResult, kind: CheckKind) -> CheckResultStatus {
    result.get(kind).unwrap().result
}

#[test]
fn fresh_attestation_verifies() {
    let attestation = build(br#"{"v":1}"#);
    let result = verifier().verify(&attestation, &VerifyContext::default());

    assert!(result.passed(), "{:#?}", result.checks);
    assert_eq!(result.checks.len(), CheckKind::ALL.len());
    for (check, kind) in result.checks.iter().zip(CheckKind::ALL) {
        assert_eq!(check.check, kind);
    }
    // v2 payloads always carry a workflow reference to compare.
    assert_eq!(status(&result, CheckKind::WorkflowRef), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::OracleIdentity), CheckResultStatus::Skip);
}

#[test]
fn claims_populate_payload() {
    let attestation = build(br#"{"v":1}"#);
    let payload = &attestation.payload;
    assert_eq!(payload.schema_version, SchemaVersion::V2);
    assert_eq!(payload.commit_sha, COMMIT);
    assert_eq!(payload.timestamp.as_str(), "2024-01-01T00:00:00Z");
    assert_eq!(payload.workflow_ref.as_deref(), Some(WORKFLOW_REF));
    assert_eq!(payload.url, URL);
    assert_eq!(payload.content_size, 7);
}

#[test]
fn configured_constraints_pass_when_matching() {
    let attestation = build(br#"{"v":1}"#);
    let context = VerifyContext {
        expected_workflow_ref: Some(WORKFLOW_REF.to_string()),
        current_commit_sha: Some(COMMIT.to_string()),
        oracle_repository: Some(REPOSITORY.to_string()),
    };
    let result = verifier().verify(&attestation, &context);
    assert!(result.passed(), "{:#?}", result.checks);
    assert!(result
        .checks
        .iter()
        .all(|c| c.result == CheckResultStatus::Pass));
}

#[test]
fn flipped_content_byte_fails_digest_checks_only() {
    let mut attestation = build(br#"{"v":1}"#);
    attestation.payload.content[5] = b'2';

    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert!(!result.passed());
    assert_eq!(status(&result, CheckKind::IdentityToken), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::Signature), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::PayloadDigest), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Recomputation), CheckResultStatus::Fail);
    assert_eq!(result.failures().count(), 2);
    assert_eq!(result.checks.len(), 7);
}

#[test]
fn stored_size_lie_fails_payload_digest_only() {
    let mut attestation = build(br#"{"v":1}"#);
    attestation.payload.content_size = 99;

    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert_eq!(status(&result, CheckKind::PayloadDigest), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Recomputation), CheckResultStatus::Pass);
}

#[test]
fn mismatched_expectations_fail_their_checks() {
    let attestation = build(br#"{"v":1}"#);
    let context = VerifyContext {
        expected_workflow_ref: Some(
            "kipz/url-oracle/.github/workflows/other.yml@refs/heads/main".to_string(),
        ),
        current_commit_sha: Some("def456".to_string()),
        oracle_repository: Some("someone/else".to_string()),
    };
    let result = verifier().verify(&attestation, &context);
    assert!(!result.passed());
    assert_eq!(status(&result, CheckKind::WorkflowRef), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::WorkflowSha), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::OracleIdentity), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Signature), CheckResultStatus::Pass);
    assert_eq!(result.summary(), "4 passed, 3 failed, 0 skipped");
}

#[test]
fn payload_commit_must_match_token() {
    let mut attestation = build(br#"{"v":1}"#);
    attestation.payload.commit_sha = "f00".to_string();
    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert_eq!(status(&result, CheckKind::WorkflowSha), CheckResultStatus::Fail);
}

#[test]
fn payload_workflow_ref_must_match_token() {
    let mut attestation = build(br#"{"v":1}"#);
    attestation.payload.workflow_ref =
        Some("kipz/url-oracle/.github/workflows/other.yml@refs/heads/main".to_string());
    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert_eq!(status(&result, CheckKind::WorkflowRef), CheckResultStatus::Fail);
}

#[test]
fn untrusted_issuer_fails_identity_but_others_still_run() {
    let attestation = build(br#"{"v":1}"#);
    let stranger = LocalIssuer::new(ISSUER);
    let result = Verifier::new(PkTokenVerifier::new(stranger))
        .verify(&attestation, &VerifyContext::default());

    assert_eq!(status(&result, CheckKind::IdentityToken), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Signature), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::PayloadDigest), CheckResultStatus::Pass);
    assert_eq!(result.checks.len(), 7);
}

#[test]
fn garbage_signature_fails_signature_and_digest_checks() {
    let mut attestation = build(br#"{"v":1}"#);
    attestation.signature = b"not a jws".to_vec();
    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert_eq!(status(&result, CheckKind::IdentityToken), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::Signature), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::PayloadDigest), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Recomputation), CheckResultStatus::Fail);
}

#[test]
fn legacy_v1_attestation_recomputes_under_v1_rules() {
    let fetcher = StaticFetcher::new(b"legacy body");
    let signer = signer();
    let store = MemoryStore::default();
    let attestation = AttestationBuilder::new(&fetcher, &signer, &store)
        .with_schema_version(SchemaVersion::V1)
        .build(URL, true)
        .unwrap();
    assert_eq!(attestation.payload.workflow_ref, None);

    // Written without a version field, as legacy files were.
    let mut json = serde_json::to_value(&attestation).unwrap();
    json["payload"].as_object_mut().unwrap().remove("schema_version");
    let reloaded: Attestation = serde_json::from_value(json).unwrap();
    assert_eq!(reloaded.payload.schema_version, SchemaVersion::V1);

    let result = verifier().verify(&reloaded, &VerifyContext::default());
    assert!(result.passed(), "{:#?}", result.checks);
    assert_eq!(status(&result, CheckKind::WorkflowRef), CheckResultStatus::Skip);
}

#[test]
fn workflow_ref_added_to_signed_v1_payload_is_rejected() {
    let fetcher = StaticFetcher::new(b"legacy body");
    let signer = signer();
    let store = MemoryStore::default();
    let mut attestation = AttestationBuilder::new(&fetcher, &signer, &store)
        .with_schema_version(SchemaVersion::V1)
        .build(URL, true)
        .unwrap();
    attestation.payload.workflow_ref = Some(WORKFLOW_REF.to_string());

    let result = verifier().verify(&attestation, &VerifyContext::default());
    assert!(!result.passed());
    assert_eq!(status(&result, CheckKind::Signature), CheckResultStatus::Pass);
    assert_eq!(status(&result, CheckKind::PayloadDigest), CheckResultStatus::Fail);
    assert_eq!(status(&result, CheckKind::Recomputation), CheckResultStatus::Fail);
    assert!(result
        .get(CheckKind::Recomputation)
        .unwrap()
        .message
        .contains("workflow_ref"));
}

#[test]
fn persisted_json_round_trip_still_verifies() {
    let attestation = build(b"\x00\x01binary\xff");
    let text = serde_json::to_string_pretty(&attestation).unwrap();
    let reloaded: Attestation = serde_json::from_str(&text).unwrap();
    assert_eq!(reloaded, attestation);
    assert!(verifier()
        .verify(&reloaded, &VerifyContext::default())
        .passed());
}

#[test]
fn ephemeral_keys_differ_between_runs() {
    let a = build(b"x");
    let b = build(b"x");
    assert_ne!(a.identity_token.cic.upk, b.identity_token.cic.upk);
}
