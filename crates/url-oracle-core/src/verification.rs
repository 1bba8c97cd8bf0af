//! Verification of persisted attestations.
//!
//! Seven independent checks are evaluated for every attestation. A failing
//! check never prevents the others from running; the overall verdict is the
//! conjunction of all non-skipped checks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url_oracle_canonical::Canonicalizer;

use crate::claims::{CLAIM_REPOSITORY, CLAIM_WORKFLOW_REF, CLAIM_WORKFLOW_SHA};
use crate::payload::{Attestation, AttestationPayload, SchemaVersion};
use crate::signer::TokenVerifier;

/// The checks a verification runs, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Token issued by the trusted provider and bound to the ephemeral key.
    IdentityToken,
    /// Signature verifies under the ephemeral key.
    Signature,
    /// Signed message equals the digest of the stored payload.
    PayloadDigest,
    /// Signed message equals the digest of a payload rebuilt from its fields.
    Recomputation,
    /// Workflow reference matches expectations.
    WorkflowRef,
    /// Workflow commit matches the payload (and the current commit).
    WorkflowSha,
    /// Token was issued to the configured oracle repository.
    OracleIdentity,
}

impl CheckKind {
    /// All checks in evaluation order.
    pub const ALL: [CheckKind; 7] = [
        CheckKind::IdentityToken,
        CheckKind::Signature,
        CheckKind::PayloadDigest,
        CheckKind::Recomputation,
        CheckKind::WorkflowRef,
        CheckKind::WorkflowSha,
        CheckKind::OracleIdentity,
    ];

    /// Human-readable name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::IdentityToken => "identity token",
            Self::Signature => "signature",
            Self::PayloadDigest => "payload digest",
            Self::Recomputation => "payload recomputation",
            Self::WorkflowRef => "workflow reference",
            Self::WorkflowSha => "workflow commit",
            Self::OracleIdentity => "oracle identity",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResultStatus {
    /// Check passed.
    Pass,
    /// Check failed.
    Fail,
    /// Check was not configured; does not affect the verdict.
    Skip,
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which check.
    pub check: CheckKind,
    /// Pass, fail or skip.
    #[serde(rename = "result")]
    pub result: CheckResultStatus,
    /// What was compared, or why it failed.
    pub message: String,
}

impl CheckResult {
    fn pass(check: CheckKind, message: impl Into<String>) -> Self {
        Self::new(check, CheckResultStatus::Pass, message)
    }

    fn fail(check: CheckKind, message: impl Into<String>) -> Self {
        Self::new(check, CheckResultStatus::Fail, message)
    }

    fn skip(check: CheckKind, message: impl Into<String>) -> Self {
        Self::new(check, CheckResultStatus::Skip, message)
    }

    fn new(check: CheckKind, result: CheckResultStatus, message: impl Into<String>) -> Self {
        Self {
            check,
            result,
            message: message.into(),
        }
    }
}

/// Optional expectations supplied by whoever runs the verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyContext {
    /// Workflow reference the token must carry.
    pub expected_workflow_ref: Option<String>,
    /// Current commit the token's workflow commit must equal.
    pub current_commit_sha: Option<String>,
    /// `owner/repo` the token must have been issued to.
    pub oracle_repository: Option<String>,
}

/// Per-check outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// One entry per [`CheckKind`], in order.
    pub checks: Vec<CheckResult>,
}

impl VerificationResult {
    /// True when no check failed.
    pub fn passed(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.result != CheckResultStatus::Fail)
    }

    /// The failing checks.
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.result == CheckResultStatus::Fail)
    }

    /// Result of a specific check.
    pub fn get(&self, check: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check == check)
    }

    /// One-line tally, e.g. `6 passed, 0 failed, 1 skipped`.
    pub fn summary(&self) -> String {
        let count = |status| self.checks.iter().filter(|c| c.result == status).count();
        format!(
            "{} passed, {} failed, {} skipped",
            count(CheckResultStatus::Pass),
            count(CheckResultStatus::Fail),
            count(CheckResultStatus::Skip)
        )
    }
}

/// Runs the verification checks against a trusted token verifier.
pub struct Verifier<V> {
    tokens: V,
    canonicalizer: Canonicalizer,
}

impl<V: TokenVerifier> Verifier<V> {
    /// Verifier trusting `tokens`.
    pub fn new(tokens: V) -> Self {
        Self {
            tokens,
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Evaluates every check against `attestation`.
    pub fn verify(&self, attestation: &Attestation, context: &VerifyContext) -> VerificationResult {
        let token = &attestation.identity_token;
        let payload = &attestation.payload;

        let identity = match self.tokens.verify_token(token) {
            Ok(()) => CheckResult::pass(
                CheckKind::IdentityToken,
                "issued by the trusted provider and bound to the ephemeral key",
            ),
            Err(e) => CheckResult::fail(CheckKind::IdentityToken, e.to_string()),
        };

        let (signature, message) = match self.tokens.verify_signed_message(token, &attestation.signature) {
            Ok(message) => (
                CheckResult::pass(CheckKind::Signature, "verifies under the ephemeral key"),
                Some(message),
            ),
            Err(e) => (CheckResult::fail(CheckKind::Signature, e.to_string()), None),
        };

        // The token is decoded once; check 1 is what establishes trust in it.
        let claims = token.unverified_claims().ok();

        let checks = vec![
            identity,
            signature,
            self.check_payload_digest(payload, message.as_deref()),
            self.check_recomputation(payload, message.as_deref()),
            check_workflow_ref(payload, claims.as_ref(), context),
            check_workflow_sha(payload, claims.as_ref(), context),
            check_oracle_identity(claims.as_ref(), context),
        ];
        for check in &checks {
            debug!(check = %check.check, result = ?check.result, message = %check.message, "verification check");
        }

        let result = VerificationResult { checks };
        if result.passed() {
            info!(summary = %result.summary(), "attestation verified");
        } else {
            warn!(summary = %result.summary(), "attestation failed verification");
        }
        result
    }

    fn check_payload_digest(&self, payload: &AttestationPayload, message: Option<&[u8]>) -> CheckResult {
        let kind = CheckKind::PayloadDigest;
        let Some(message) = message else {
            return CheckResult::fail(kind, "no signed message recovered");
        };
        match payload.digest(&self.canonicalizer) {
            Ok(digest) if digest.matches_raw(message) => {
                CheckResult::pass(kind, format!("signed message equals {digest}"))
            }
            Ok(digest) => CheckResult::fail(
                kind,
                format!("signed message does not equal stored payload digest {digest}"),
            ),
            Err(e) => CheckResult::fail(kind, e.to_string()),
        }
    }

    fn check_recomputation(&self, payload: &AttestationPayload, message: Option<&[u8]>) -> CheckResult {
        let kind = CheckKind::Recomputation;
        let Some(message) = message else {
            return CheckResult::fail(kind, "no signed message recovered");
        };
        let rebuilt = match payload.rebuild().and_then(|p| p.digest(&self.canonicalizer)) {
            Ok(digest) => digest,
            Err(e) => return CheckResult::fail(kind, e.to_string()),
        };
        if rebuilt.matches_raw(message) {
            CheckResult::pass(
                kind,
                format!(
                    "schema v{} payload rebuilt from its fields hashes to the signed message",
                    payload.schema_version.as_u32()
                ),
            )
        } else if !payload.content_is_consistent() {
            CheckResult::fail(kind, "stored content digest or size does not match content")
        } else {
            CheckResult::fail(kind, format!("rebuilt payload hashes to {rebuilt}"))
        }
    }
}

fn claim<'a>(claims: Option<&'a Map<String, Value>>, name: &str) -> Option<&'a str> {
    claims?.get(name)?.as_str()
}

fn check_workflow_ref(
    payload: &AttestationPayload,
    claims: Option<&Map<String, Value>>,
    context: &VerifyContext,
) -> CheckResult {
    let kind = CheckKind::WorkflowRef;
    let embedded = payload.schema_version == SchemaVersion::V2;
    if context.expected_workflow_ref.is_none() && !embedded {
        return CheckResult::skip(kind, "no expected workflow reference configured");
    }
    let Some(actual) = claim(claims, CLAIM_WORKFLOW_REF) else {
        return CheckResult::fail(kind, format!("token has no `{CLAIM_WORKFLOW_REF}` claim"));
    };
    if let Some(expected) = &context.expected_workflow_ref {
        if actual != expected {
            return CheckResult::fail(kind, format!("token has {actual}, expected {expected}"));
        }
    }
    if embedded && payload.workflow_ref.as_deref() != Some(actual) {
        return CheckResult::fail(
            kind,
            format!(
                "payload names {}, token has {actual}",
                payload.workflow_ref.as_deref().unwrap_or("<none>")
            ),
        );
    }
    CheckResult::pass(kind, actual)
}

fn check_workflow_sha(
    payload: &AttestationPayload,
    claims: Option<&Map<String, Value>>,
    context: &VerifyContext,
) -> CheckResult {
    let kind = CheckKind::WorkflowSha;
    let Some(actual) = claim(claims, CLAIM_WORKFLOW_SHA) else {
        return CheckResult::fail(kind, format!("token has no `{CLAIM_WORKFLOW_SHA}` claim"));
    };
    if actual != payload.commit_sha {
        return CheckResult::fail(
            kind,
            format!("token has {actual}, payload has {}", payload.commit_sha),
        );
    }
    match &context.current_commit_sha {
        Some(current) if current != actual => {
            CheckResult::fail(kind, format!("token has {actual}, current commit is {current}"))
        }
        Some(_) => CheckResult::pass(kind, format!("{actual} (matches current commit)")),
        None => CheckResult::pass(kind, actual),
    }
}

fn check_oracle_identity(claims: Option<&Map<String, Value>>, context: &VerifyContext) -> CheckResult {
    let kind = CheckKind::OracleIdentity;
    let Some(expected) = &context.oracle_repository else {
        return CheckResult::skip(kind, "no oracle repository configured");
    };
    match claim(claims, CLAIM_REPOSITORY) {
        Some(actual) if actual == expected => CheckResult::pass(kind, actual),
        Some(actual) => CheckResult::fail(kind, format!("token issued to {actual}, expected {expected}")),
        None => CheckResult::fail(kind, format!("token has no `{CLAIM_REPOSITORY}` claim")),
    }
}
