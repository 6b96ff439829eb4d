//! Tracking normalization and the per-source extraction heuristics.

use once_cell::sync::Lazy;
use regex::Regex;

/// Anything shorter than this after normalization is an incidental numeric
/// string, not a tracking number.
pub const MIN_TRACKING_LEN: usize = 10;

/// A bare digit run this long is a non-UPS tracking candidate in scanned
/// sources (FedEx ground, USPS).
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12,}").expect("digit run pattern"));

/// CustomInk order ids embedded in reference tokens: 7-10 digits
/// immediately followed by a letter suffix.
static ORDER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{7,10})[A-Za-z]").expect("order token pattern"));

/// Canonical tracking form: alphanumerics only, uppercased. Idempotent.
pub fn normalize_tracking(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Digits-only view of a PO or order id.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Deterministic-column extraction: normalize the configured cells, keep
/// anything long enough.
pub fn fixed_column_trackings(row: &[String], columns: &[usize]) -> Vec<String> {
    let mut found = Vec::new();
    for &column in columns {
        let Some(cell) = row.get(column) else { continue };
        let normalized = normalize_tracking(cell);
        if normalized.len() >= MIN_TRACKING_LEN {
            found.push(normalized);
        }
    }
    found
}

/// Ambiguous-source extraction: scan the leading cells and keep values
/// that look like carrier tracking numbers. All accepted candidates are
/// kept: dual-carrier rows carry one UPS and one FedEx number.
pub fn scanned_trackings(row: &[String], max_cells: usize) -> Vec<String> {
    let mut found = Vec::new();
    for cell in row.iter().take(max_cells) {
        let normalized = normalize_tracking(cell);
        if normalized.len() >= MIN_TRACKING_LEN
            && (normalized.starts_with("1Z") || DIGIT_RUN.is_match(&normalized))
        {
            found.push(normalized);
        }
    }
    found
}

/// Split a pipe-delimited reference field into trimmed, non-empty tokens.
pub fn reference_tokens(reference: &str) -> Vec<String> {
    reference
        .split('|')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// The digit prefix of an order-id token, if the token contains one.
pub fn order_token_digits(token: &str) -> Option<&str> {
    ORDER_TOKEN
        .captures(token)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
