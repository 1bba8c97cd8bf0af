//! Deciding whether new content warrants a new attestation.

use std::path::Path;

use tracing::{debug, warn};
use url_oracle_canonical::Digest;
use url_oracle_core::content_changed;

use crate::files::read_attestation;

/// Returns `true` unless the attestation at `previous` holds content whose
/// digest equals `new_digest`.
///
/// Absent, unreadable and malformed previous files all count as a change.
pub fn check_for_change(new_digest: &Digest, previous: Option<&Path>) -> bool {
    let Some(path) = previous else {
        debug!("no previous attestation given");
        return true;
    };
    match read_attestation(path) {
        Ok(attestation) => {
            let changed = content_changed(new_digest, Some(&attestation.payload));
            debug!(path = %path.display(), changed, "compared against previous attestation");
            changed
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "previous attestation unusable; treating as changed");
            true
        }
    }
}
