//! Helpers for turning raw input lines into URLs.

/// Normalize one raw input line.
///
/// Surrounding whitespace, including the `\r` of CRLF input and the trailing
/// `\n`, is stripped. Blank lines yield `None` and are never dispatched.
/// Invalid UTF-8 is replaced rather than rejected; the fetch for such a URL
/// simply fails.
pub fn normalize_input_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let trimmed = line.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
