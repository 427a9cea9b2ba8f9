//! Stable grouping keys for error reports.
//!
//! Superficially different messages (ids, counters, hashes, spacing) collapse
//! to one normalized form before hashing, so repeated occurrences of the same
//! failure land in the same aggregate.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::ErrorReport;

const NUMBER_TOKEN: &str = "NUMBER";
const UUID_TOKEN: &str = "UUID";
const HASH_TOKEN: &str = "HASH";
const COMPONENT_DELIMITER: &str = ":";
const MIN_HASH_UNITS: usize = 8;

struct NormalizationPatterns {
    uuids: Regex,
    hex_runs: Regex,
    digit_runs: Regex,
    whitespace: Regex,
}

fn build_patterns() -> Option<NormalizationPatterns> {
    Some(NormalizationPatterns {
        uuids: Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .ok()?,
        hex_runs: Regex::new(r"[0-9a-fA-F]+").ok()?,
        digit_runs: Regex::new(r"[0-9]+").ok()?,
        whitespace: Regex::new(r"\s+").ok()?,
    })
}

static PATTERNS: LazyLock<Option<NormalizationPatterns>> = LazyLock::new(build_patterns);

/// Resolve the grouping key for a report.
///
/// A caller-supplied fingerprint wins unchanged. Otherwise the key is a hash of
/// module, function, error code and the normalized message.
pub fn fingerprint(report: &ErrorReport) -> String {
    if let Some(explicit) = report.fingerprint.as_deref()
        && !explicit.is_empty()
    {
        return explicit.to_string();
    }

    let normalized = normalize_message(&report.message);
    let composite = [
        report.module.as_str(),
        report.function.as_deref().unwrap_or_default(),
        report.error_code.as_deref().unwrap_or_default(),
        normalized.as_str(),
    ]
    .join(COMPONENT_DELIMITER);
    string_hash(&composite)
}

/// Strip volatile fragments from an error message.
///
/// UUIDs are replaced first; otherwise their digits would be rewritten and two
/// different UUIDs would normalize differently. Every remaining hex-alphabet run
/// is then measured with each digit run counted as a single unit, so the length
/// of a number never decides between `NUMBER` and `HASH`.
pub fn normalize_message(message: &str) -> String {
    let Some(patterns) = PATTERNS.as_ref() else {
        return message.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    };

    let result = patterns.uuids.replace_all(message, UUID_TOKEN);
    let result = patterns.hex_runs.replace_all(&result, |caps: &Captures<'_>| {
        collapse_hex_run(&patterns.digit_runs, &caps[0])
    });
    let result = patterns.whitespace.replace_all(&result, " ");
    result.to_lowercase().trim().to_string()
}

fn collapse_hex_run(digit_runs: &Regex, run: &str) -> String {
    let letters = run.bytes().filter(|byte| !byte.is_ascii_digit()).count();
    if letters == 0 {
        return NUMBER_TOKEN.to_string();
    }
    if letters + digit_runs.find_iter(run).count() >= MIN_HASH_UNITS {
        return HASH_TOKEN.to_string();
    }
    digit_runs.replace_all(run, NUMBER_TOKEN).into_owned()
}

/// 32-bit shift-and-subtract string hash over UTF-16 code units, rendered as
/// unsigned lower-case hex. Stable across processes and platforms.
fn string_hash(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    format!("{:x}", hash.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn report(message: &str) -> ErrorReport {
        ErrorReport::new(message, "checkout").with_function("submitOrder")
    }

    #[test]
    fn digit_runs_do_not_change_the_fingerprint() {
        assert_eq!(
            fingerprint(&report("Order 1234 timed out after 30s")),
            fingerprint(&report("Order 98 timed out after 4500s")),
        );
        assert_eq!(
            fingerprint(&report("retry 7 of 12345678")),
            fingerprint(&report("retry 3 of 9")),
        );
    }

    #[test]
    fn digit_run_adjacent_to_hex_letters_does_not_change_the_fingerprint() {
        let cache = |message: &str| fingerprint(&ErrorReport::new(message, "cache"));
        assert_eq!(
            cache("cache miss for key abc12345"),
            cache("cache miss for key abc1"),
        );
        assert_eq!(
            normalize_message("cache miss for key abc12345"),
            "cache miss for key abcnumber"
        );
        assert_eq!(
            fingerprint(&report("blob 0a1b2c3d4e5f6 missing")),
            fingerprint(&report("blob 0a1b2c3d4e5f999 missing")),
        );
        assert_eq!(normalize_message("blob 0a1b2c3d4e5f6"), "blob hash");
    }

    #[test]
    fn uuids_do_not_change_the_fingerprint() {
        assert_eq!(
            fingerprint(&report(
                "user 3f0b9c52-8f0e-4d0a-9a5e-3b8cb1f6a2de not found"
            )),
            fingerprint(&report(
                "user a1b2c3d4-e5f6-4789-abcd-ef0123456789 not found"
            )),
        );
    }

    #[test]
    fn whitespace_layout_does_not_change_the_fingerprint() {
        assert_eq!(
            fingerprint(&report("connection   reset\tby\npeer")),
            fingerprint(&report("  connection reset by peer ")),
        );
    }

    #[test]
    fn different_context_changes_the_fingerprint() {
        let base = report("connection reset by peer");
        let other_module = ErrorReport::new("connection reset by peer", "search")
            .with_function("submitOrder");
        let other_code = base.clone().with_error_code("E_RESET");
        assert_ne!(fingerprint(&base), fingerprint(&other_module));
        assert_ne!(fingerprint(&base), fingerprint(&other_code));
        assert_ne!(
            fingerprint(&base),
            fingerprint(&report("connection refused by peer"))
        );
    }

    #[test]
    fn explicit_fingerprint_is_returned_unchanged() {
        let explicit = report("anything")
            .with_severity(Severity::Critical)
            .with_fingerprint("Checkout/Timeout#1");
        assert_eq!(fingerprint(&explicit), "Checkout/Timeout#1");
    }

    #[test]
    fn fingerprint_is_stable_lowercase_hex() {
        let value = fingerprint(&report("Payment gateway returned 502"));
        assert_eq!(value, fingerprint(&report("Payment gateway returned 502")));
        assert!(!value.is_empty());
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn normalize_replaces_volatile_fragments() {
        assert_eq!(
            normalize_message("Job 42 hash deadbeef01 id 3F0B9C52-8F0E-4D0A-9A5E-3B8CB1F6A2DE"),
            "job number hash hash id uuid"
        );
        assert_eq!(normalize_message("  MIXED\tCase  "), "mixed case");
    }

    #[test]
    fn string_hash_matches_known_values() {
        assert_eq!(string_hash(""), "0");
        assert_eq!(string_hash("a"), "61");
        assert_eq!(string_hash("ab"), "c21");
    }
}
