use crate::errors::ParseError;

/// Leading tokens accepted by the corruption gate, lowercased. Manifest
/// exports from every known supplier open with either a quoted cell or one
/// of these words; binary uploads mangled in transit do not.
const LEADING_TOKENS: &[&str] = &["tracking", "date", "ship", "po", "carrier", "order"];

/// Reject CSV content that does not look like a manifest export.
///
/// The gate is deliberately narrow: content must start with a `"` or with a
/// known leading token. Valid but unusual CSV dialects will be rejected;
/// that is the documented behavior, not an oversight.
pub fn csv_gate(content: &str) -> Result<(), ParseError> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        // An empty file is "no data", handled downstream as zero rows.
        return Ok(());
    }
    if trimmed.starts_with('"') {
        return Ok(());
    }
    let first_line = trimmed.lines().next().unwrap_or_default().to_lowercase();
    if LEADING_TOKENS
        .iter()
        .any(|token| first_line.starts_with(token))
    {
        return Ok(());
    }
    Err(ParseError::CorruptedCsv {
        reason: format!(
            "content starts with {:?}, expected a quote or a known leading token",
            trimmed.chars().take(12).collect::<String>()
        ),
    })
}

/// Quote-aware, character-by-character comma splitter.
///
/// A `"` toggles the in-quotes flag and is never emitted; commas inside
/// quotes are literal. Escaped `""` inside quoted fields is NOT supported,
/// a known limitation carried over from the manifest producers, which never
/// emit it. Newlines inside quoted fields are likewise unsupported: rows
/// are split per physical line.
pub fn parse_csv_text(content: &str) -> Vec<Vec<String>> {
    content.lines().map(split_line).collect()
}

fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            '\r' | '\n' => {}
            _ => current.push(ch),
        }
    }
    values.push(current.trim().to_string());
    values
}
