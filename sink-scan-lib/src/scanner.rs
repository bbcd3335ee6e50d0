//! Occurrence scanning over raw document bytes.
//!
//! Documents are split on `\n` only. A trailing `\r` from CRLF input stays
//! part of the line; it never shifts a column because columns count bytes
//! from the start of the line. Patterns never match across a line boundary.

use crate::patterns::PatternRegistry;
use crate::types::{Occurrence, ScanResult};

/// Scan a document against every registered pattern.
///
/// Occurrences come out ordered by line, then by pattern registration order,
/// then by match start. Matches of one pattern within a line do not overlap.
///
/// # Example
///
/// ```rust
/// use sink_scan_lib::{scan_document, PatternRegistry};
///
/// let registry = PatternRegistry::from_preset("broad").unwrap();
/// let result = scan_document(b"<p>\nel.innerHTML = x;\n", &registry);
/// let first = &result.occurrences()[0];
/// assert_eq!((first.keyword.as_str(), first.line, first.column), ("innerHTML", 2, 4));
/// ```
pub fn scan_document(body: &[u8], registry: &PatternRegistry) -> ScanResult {
    let mut result = ScanResult::new();

    for (index, line) in body.split(|&b| b == b'\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        scan_line(line, index + 1, registry, &mut result);
    }

    result
}

fn scan_line(line: &[u8], line_number: usize, registry: &PatternRegistry, out: &mut ScanResult) {
    for pattern in registry.iter() {
        for found in pattern.regex().find_iter(line) {
            out.push(Occurrence::new(
                pattern.name(),
                line_number,
                found.start() + 1,
            ));
        }
    }
}
