mod common;

use common::*;
use url_oracle_canonical::{Canonicalizer, Digest};
use url_oracle_core::{
    content_changed, AttestationBuilder, AttestationDetails, BuildError, ChainError, ChainLink,
    ChainLinker, PreviousArtifact, VerifyContext,
};

const URL: &str = "https://example.com/a.json";

#[test]
fn first_attestation_has_no_link() {
    let fetcher = StaticFetcher::new(br#"{"v":1}"#);
    let store = MemoryStore::default();
    let attestation = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, false)
        .unwrap();

    assert_eq!(attestation.payload.previous_attestation_digest, None);
    let queried = store.queries.borrow();
    assert_eq!(queried.len(), 1);
    assert_eq!(queried[0].repository(), REPOSITORY);
    assert_eq!(queried[0].workflow_file, "create-attestation.yml");
    assert_eq!(queried[0].branch, "main");
}

#[test]
fn previous_details_digest_is_embedded() {
    let previous = Digest::sha256(b"previous payload");
    let store = MemoryStore::holding(PreviousArtifact::Details(AttestationDetails {
        digest: previous.clone(),
        artifact_locator: "artifact://run/41".to_string(),
    }));
    let fetcher = StaticFetcher::new(b"body");
    let attestation = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, false)
        .unwrap();
    assert_eq!(attestation.payload.previous_attestation_digest, Some(previous));
}

#[test]
fn previous_attestation_digest_is_recomputed() {
    let canonicalizer = Canonicalizer::default();
    let fetcher = StaticFetcher::new(b"first");
    let store = MemoryStore::default();
    let first = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, false)
        .unwrap();

    store.put(PreviousArtifact::Attestation {
        attestation: Box::new(first.clone()),
        locator: "dir:/tmp/previous".to_string(),
    });
    fetcher.set(b"second");
    let second = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, false)
        .unwrap();

    assert_eq!(
        second.payload.previous_attestation_digest,
        Some(first.payload.digest(&canonicalizer).unwrap())
    );
}

#[test]
fn lookup_error_aborts_build() {
    let fetcher = StaticFetcher::new(b"body");
    let store = MemoryStore::broken();
    let err = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, false)
        .unwrap_err();
    assert!(
        matches!(err, BuildError::ChainLink(ChainError::Lookup { .. })),
        "{err}"
    );
}

#[test]
fn skipping_the_link_ignores_a_broken_store() {
    let fetcher = StaticFetcher::new(b"body");
    let store = MemoryStore::broken();
    let attestation = AttestationBuilder::new(&fetcher, signer(), &store)
        .build(URL, true)
        .unwrap();
    assert_eq!(attestation.payload.previous_attestation_digest, None);
    assert!(store.queries.borrow().is_empty());
}

#[test]
fn fetch_failure_aborts_build() {
    let store = MemoryStore::default();
    let err = AttestationBuilder::new(FailingFetcher, signer(), &store)
        .build(URL, false)
        .unwrap_err();
    assert!(matches!(err, BuildError::Fetch(_)), "{err}");
    assert!(store.queries.borrow().is_empty());
}

#[test]
fn missing_claim_aborts_build() {
    let issuer = url_oracle_core::LocalIssuer::new(ISSUER)
        .with_claim("job_workflow_ref", WORKFLOW_REF);
    let fetcher = StaticFetcher::new(b"body");
    let err = AttestationBuilder::new(
        &fetcher,
        url_oracle_core::EphemeralSigner::new(issuer),
        MemoryStore::default(),
    )
    .build(URL, false)
    .unwrap_err();
    assert!(matches!(err, BuildError::Claims(_)), "{err}");
}

#[test]
fn malformed_workflow_ref_is_an_error_not_absence() {
    let linker = ChainLinker::new(MemoryStore::default());
    let err = linker
        .link("kipz/url-oracle/.github/workflows/a.yml@refs/heads/feature/x")
        .unwrap_err();
    assert!(matches!(err, ChainError::MalformedWorkflowRef { .. }));
    assert_eq!(linker.link(WORKFLOW_REF).unwrap(), ChainLink::NotFound);
}

#[test]
fn monitoring_scenario() {
    let canonicalizer = Canonicalizer::default();
    let fetcher = StaticFetcher::new(br#"{"v":1}"#);
    let store = MemoryStore::default();
    let builder = AttestationBuilder::new(&fetcher, signer(), &store);

    // No prior attestation: the first one starts the chain.
    let first = builder.build(URL, false).unwrap();
    assert_eq!(first.payload.commit_sha, "abc123");
    assert_eq!(first.payload.previous_attestation_digest, None);
    store.put(PreviousArtifact::Attestation {
        attestation: Box::new(first.clone()),
        locator: "run-1".to_string(),
    });

    // Same content: nothing to attest.
    let unchanged = Digest::sha256(br#"{"v":1}"#);
    assert!(!content_changed(&unchanged, Some(&first.payload)));

    // New content: changed, and the new attestation links to the first.
    fetcher.set(br#"{"v":2}"#);
    let changed = Digest::sha256(br#"{"v":2}"#);
    assert!(content_changed(&changed, Some(&first.payload)));
    let second = builder.build(URL, false).unwrap();
    assert_eq!(
        second.payload.previous_attestation_digest,
        Some(first.payload.digest(&canonicalizer).unwrap())
    );

    let result = verifier().verify(&second, &VerifyContext::default());
    assert!(result.passed(), "{:#?}", result.checks);
}
