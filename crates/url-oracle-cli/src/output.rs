//! Output formatting utilities.

use serde::Serialize;
use url_oracle_core::{CheckResult, CheckResultStatus};

/// Formats a value as pretty JSON.
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats one verification check as `[PASS] name: message`.
pub fn format_check(check: &CheckResult) -> String {
    let tag = match check.result {
        CheckResultStatus::Pass => "PASS",
        CheckResultStatus::Fail => "FAIL",
        CheckResultStatus::Skip => "SKIP",
    };
    format!("[{tag}] {}: {}", check.check, check.message)
}

/// Formats a label/value row.
pub fn format_field(label: &str, value: &str) -> String {
    format!("{:<22} {}", format!("{label}:"), value)
}

/// Shortens long values for tabular output.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url_oracle_core::CheckKind;

    #[test]
    fn check_lines_are_tagged() {
        let check = CheckResult {
            check: CheckKind::Signature,
            result: CheckResultStatus::Fail,
            message: "bad".to_string(),
        };
        assert_eq!(format_check(&check), "[FAIL] signature: bad");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }
}
