//! Normalization of raw API field names into metric identifier segments.

use std::fmt;

/// Prefix applied to keys whose normalized form would start with a digit.
const DIGIT_PREFIX: &str = "n_";

/// Key used when nothing of the raw name survives normalization.
const EMPTY_KEY: &str = "unnamed";

/// A normalized metric key, matching `[a-z][a-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a raw field name into a [`SeriesKey`].
///
/// ASCII letters are lowercased, every run of characters outside
/// `[a-z0-9_]` becomes a single underscore, consecutive underscores collapse
/// and leading/trailing underscores are stripped. The function is idempotent:
/// `normalize(normalize(x).as_str()) == normalize(x)`.
pub fn normalize(raw: &str) -> SeriesKey {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            // '_' and every other character act as a separator
            pending_sep = true;
        }
    }

    if out.is_empty() {
        return SeriesKey(EMPTY_KEY.to_string());
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, DIGIT_PREFIX);
    }
    SeriesKey(out)
}

/// Returns true if `s` already satisfies the key grammar.
pub fn is_valid_key(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
