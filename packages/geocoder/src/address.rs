//! Address cleanup before geocoding.
//!
//! Address lists exported from county records carry uneven whitespace and
//! placeholder values (`"N/A"`, `"UNKNOWN"`). Placeholders are rejected
//! up front so they never cost a provider request.

use regex::Regex;
use std::sync::LazyLock;

/// Runs of whitespace, collapsed to a single space.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n]+").expect("valid regex"));

/// Non-geocodable address placeholders.
static SKIP_PATTERNS: &[&str] = &[
    "UNKNOWN",
    "N/A",
    "NA",
    "NONE",
    "NULL",
    "NOT AVAILABLE",
];

/// Normalizes an address for geocoding.
///
/// Returns `None` when nothing geocodable remains: an empty string, a
/// placeholder, or text without any letter or digit.
#[must_use]
pub fn normalize(address: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(address.trim(), " ");
    let cleaned = collapsed.trim_matches(|c: char| c == ',' || c.is_whitespace());

    if cleaned.is_empty() || !cleaned.chars().any(char::is_alphanumeric) {
        return None;
    }

    let upper = cleaned.to_uppercase();
    if SKIP_PATTERNS.contains(&upper.as_str()) {
        return None;
    }

    Some(cleaned.to_string())
}
