//! Pattern file loading (TOML).
//!
//! A pattern file is a list of `[[patterns]]` tables, each with a `name` and
//! a `regex` (or `pattern`) field:
//!
//! ```toml
//! [[patterns]]
//! name = "innerHTML"
//! regex = 'innerHTML\s*='
//! ```

use crate::error::ScanError;
use crate::patterns::registry::PatternRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One pattern as written in a file or config, before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub name: String,

    /// Regular expression source. `pattern` is accepted as an alias.
    #[serde(alias = "pattern")]
    pub regex: String,
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

/// Parse pattern file contents into a compiled registry.
pub fn parse_pattern_file(content: &str) -> Result<PatternRegistry, ScanError> {
    let parsed: PatternFile = toml::from_str(content)?;
    entries_to_registry(&parsed.patterns)
}

/// Load and compile a pattern file.
///
/// # Errors
///
/// Returns `ScanError::FileError` if the file cannot be read,
/// `ScanError::ConfigError` if it is not valid TOML or holds no patterns,
/// and `ScanError::PatternCompile` for the first pattern that fails to compile.
pub fn load_pattern_file<P: AsRef<Path>>(path: P) -> Result<PatternRegistry, ScanError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScanError::file_error(
            path.to_string_lossy(),
            format!("Failed to read pattern file: {}", e),
        )
    })?;

    parse_pattern_file(&content)
}

/// Compile entries (from a pattern file or a config `[[patterns]]` list).
pub fn entries_to_registry(entries: &[PatternEntry]) -> Result<PatternRegistry, ScanError> {
    PatternRegistry::from_pairs(entries.iter().map(|e| (e.name.as_str(), e.regex.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_pattern_file_with_alias() {
        let content = r#"
[[patterns]]
name = "innerHTML"
regex = 'innerHTML\s*='

[[patterns]]
name = "jquery-html"
pattern = '\.html\('
"#;
        let registry = parse_pattern_file(content).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.patterns()[1].name(), "jquery-html");
        assert_eq!(registry.patterns()[1].source(), r"\.html\(");
    }

    #[test]
    fn test_parse_empty_pattern_file_fails() {
        assert!(parse_pattern_file("").is_err());
    }

    #[test]
    fn test_parse_invalid_regex_is_pattern_error() {
        let content = r#"
[[patterns]]
name = "broken"
regex = "eval("
"#;
        let err = parse_pattern_file(content).unwrap_err();
        assert!(matches!(err, ScanError::PatternCompile { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_load_pattern_file_from_disk() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[[patterns]]\nname = \"eval\"\nregex = 'eval\\('\n")
            .unwrap();
        temp_file.flush().unwrap();

        let registry = load_pattern_file(temp_file.path()).unwrap();
        assert_eq!(registry.patterns()[0].name(), "eval");
    }

    #[test]
    fn test_load_missing_pattern_file() {
        let err = load_pattern_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ScanError::FileError { .. }));
    }
}
