//! Text key normalization.
//!
//! Two comparison rules live here and they must not be confused:
//!
//! - **Lookup keys** ([`key`]) are trimmed and lowercased. They decide which
//!   entity a value refers to.
//! - **Change checks** ([`same_text`]) trim but otherwise compare ordinally.
//!   A casing or accent difference is a real edit and must reach the store.
//!
//! Lowercasing is Unicode aware but never strips diacritics, so `"Jalapeño"`
//! and `"jalapeno"` are different keys.

/// Trim and case-fold a value for use as a map key.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalized key for a value, or `None` when it is blank.
///
/// Blank values are never registered in an index or conflict map.
pub fn key(value: &str) -> Option<String> {
    let normalized = normalize(value);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Trimmed value, with blank treated as absent.
pub fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Ordinal equality after trimming. Absent and blank are equal.
pub fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    trimmed(a) == trimmed(b)
}
