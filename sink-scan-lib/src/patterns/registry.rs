//! Compiled sink pattern registry and built-in presets.
//!
//! A `PatternRegistry` is built once at startup and then shared read-only
//! (behind an `Arc`) by every scan task. Nothing mutates it after
//! construction, so no locking is needed to read it.

use crate::error::ScanError;
use regex::bytes::Regex;
use std::fmt;

/// Preset used when neither a preset nor a pattern file is configured.
pub const DEFAULT_PRESET: &str = "classic";

/// A named, compiled sink pattern.
#[derive(Clone)]
pub struct SinkPattern {
    name: String,
    source: String,
    regex: Regex,
}

/// Replacement for an unescaped `.`: any character, or one byte that is not
/// part of valid UTF-8.
const ANY_CHAR_OR_BYTE: &str = r"(?:.|(?-u:[\x80-\xff]))";

impl SinkPattern {
    /// Compile a single pattern.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::PatternCompile` naming the pattern if the source
    /// is not a valid regular expression.
    pub fn new<N: Into<String>>(name: N, source: &str) -> Result<Self, ScanError> {
        let name = name.into();
        let regex = Regex::new(&widen_dot(source))
            .map_err(|e| ScanError::pattern_compile(name.clone(), source, e.to_string()))?;
        Ok(Self {
            name,
            source: source.to_string(),
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern source as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Debug for SinkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkPattern")
            .field("name", &self.name)
            .field("source", &self.source())
            .finish()
    }
}

/// Immutable, ordered set of sink patterns.
///
/// Registration order is significant: same-line occurrences are reported in
/// the order their patterns were registered.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: Vec<SinkPattern>,
}

impl PatternRegistry {
    /// Start building a registry.
    pub fn builder() -> PatternRegistryBuilder {
        PatternRegistryBuilder::default()
    }

    /// Compile a registry from `(name, source)` pairs, failing on the first
    /// pattern that does not compile.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sink_scan_lib::PatternRegistry;
    ///
    /// let registry = PatternRegistry::from_pairs([("eval", r"eval\(")]).unwrap();
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn from_pairs<I, N, S>(pairs: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::builder(), |builder, (name, source)| {
                builder.pattern(name, source.as_ref())
            })
            .build()
    }

    /// Build the registry for a named built-in preset.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::ConfigError` if the preset does not exist.
    pub fn from_preset(preset: &str) -> Result<Self, ScanError> {
        let pairs = get_preset_patterns(preset).ok_or_else(|| {
            ScanError::config(format!(
                "Unknown pattern preset '{}'. Available: {}",
                preset,
                get_available_presets().join(", ")
            ))
        })?;
        Self::from_pairs(pairs)
    }

    pub fn patterns(&self) -> &[SinkPattern] {
        &self.patterns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SinkPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternRegistry {
    /// The `classic` preset.
    fn default() -> Self {
        Self {
            patterns: CLASSIC_PATTERNS
                .iter()
                .map(|(name, source)| {
                    SinkPattern::new(*name, source).expect("built-in pattern compiles")
                })
                .collect(),
        }
    }
}

/// Fail-fast builder for `PatternRegistry`.
///
/// Patterns are collected uncompiled and compiled in order by `build`, so the
/// first bad pattern is the one reported.
#[derive(Debug, Default)]
pub struct PatternRegistryBuilder {
    pending: Vec<(String, String)>,
}

impl PatternRegistryBuilder {
    pub fn pattern<N: Into<String>, S: Into<String>>(mut self, name: N, source: S) -> Self {
        self.pending.push((name.into(), source.into()));
        self
    }

    pub fn build(self) -> Result<PatternRegistry, ScanError> {
        if self.pending.is_empty() {
            return Err(ScanError::config("Pattern registry cannot be empty"));
        }

        let mut patterns = Vec::with_capacity(self.pending.len());
        for (name, source) in self.pending {
            if name.trim().is_empty() {
                return Err(ScanError::pattern_compile(
                    name,
                    source,
                    "pattern name cannot be empty",
                ));
            }
            patterns.push(SinkPattern::new(name, &source)?);
        }

        Ok(PatternRegistry { patterns })
    }
}

/// Rewrite every unescaped `.` outside a character class as
/// `ANY_CHAR_OR_BYTE`.
///
/// In Unicode mode `.` only matches whole UTF-8 sequences, so a Latin-1 page
/// would otherwise hide `eval(\xe9)` from `eval\(.\)`. Each invalid byte
/// counts as one character, the same as a lossy decoder would produce.
fn widen_dot(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut class_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' => {
                class_depth += 1;
                out.push(c);
                // `[]` and `[^]` open a class whose first member is `]`.
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(c);
            }
            '.' if class_depth == 0 => out.push_str(ANY_CHAR_OR_BYTE),
            _ => out.push(c),
        }
    }

    out
}

// Kept verbatim for output compatibility with existing scan logs.
const CLASSIC_PATTERNS: &[(&str, &str)] = &[
    ("document.write", r"document\.write\(.\)"),
    ("document.writeln", r"document\.writeln\(.\)"),
    ("innerHTML", r"innerHTML *="),
    ("outerHTML", r"outerHTML *="),
    ("insertAdjacentHTML", r"insertAdjacentHTML\(.\)"),
    ("eval", r"eval\(.\)"),
    ("new Function", r"new Function\(.\)"),
    ("onevent", r"onevent\(.\)"),
];

const BROAD_PATTERNS: &[(&str, &str)] = &[
    ("document.write", r"document\.write\("),
    ("document.writeln", r"document\.writeln\("),
    ("innerHTML", r"innerHTML\s*="),
    ("outerHTML", r"outerHTML\s*="),
    ("insertAdjacentHTML", r"insertAdjacentHTML\("),
    ("eval", r"\beval\("),
    ("new Function", r"new\s+Function\("),
    ("onevent", r"\bon[a-z]+\s*="),
];

/// Get the `(name, source)` pairs for a built-in preset.
///
/// Preset names are case-insensitive. Returns `None` for unknown presets.
///
/// # Examples
///
/// ```rust
/// use sink_scan_lib::get_preset_patterns;
///
/// let classic = get_preset_patterns("classic").unwrap();
/// assert_eq!(classic[0].0, "document.write");
/// ```
pub fn get_preset_patterns(preset: &str) -> Option<Vec<(&'static str, &'static str)>> {
    match preset.trim().to_lowercase().as_str() {
        "classic" => Some(CLASSIC_PATTERNS.to_vec()),
        "broad" => Some(BROAD_PATTERNS.to_vec()),
        _ => None,
    }
}

/// Names of all built-in presets.
pub fn get_available_presets() -> Vec<&'static str> {
    vec!["broad", "classic"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_is_classic_in_order() {
        let registry = PatternRegistry::default();
        let names: Vec<&str> = registry.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "document.write",
                "document.writeln",
                "innerHTML",
                "outerHTML",
                "insertAdjacentHTML",
                "eval",
                "new Function",
                "onevent",
            ]
        );
        assert_eq!(registry.patterns()[2].source(), r"innerHTML *=");
    }

    #[test]
    fn test_all_presets_compile() {
        for preset in get_available_presets() {
            let registry = PatternRegistry::from_preset(preset).unwrap();
            assert_eq!(registry.len(), 8, "preset '{}'", preset);
        }
    }

    #[test]
    fn test_presets_share_names_and_order() {
        let classic: Vec<&str> = get_preset_patterns("classic")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        let broad: Vec<&str> = get_preset_patterns("broad")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(classic, broad);
    }

    #[test]
    fn test_preset_lookup_case_insensitive() {
        assert_eq!(get_preset_patterns("BROAD"), get_preset_patterns("broad"));
        assert!(get_preset_patterns("nonexistent").is_none());
        assert!(PatternRegistry::from_preset("nonexistent").is_err());
    }

    #[test]
    fn test_builder_reports_offending_pattern() {
        let err = PatternRegistry::builder()
            .pattern("good", r"innerHTML\s*=")
            .pattern("bad", r"eval(")
            .pattern("also bad", r"[")
            .build()
            .unwrap_err();

        match err {
            ScanError::PatternCompile { name, pattern, .. } => {
                assert_eq!(name, "bad");
                assert_eq!(pattern, "eval(");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_builder_rejects_empty_registry() {
        assert!(PatternRegistry::builder().build().is_err());
    }

    #[test]
    fn test_builder_rejects_blank_name() {
        let err = PatternRegistry::from_pairs([("  ", "x")]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_widen_dot_skips_escapes_and_classes() {
        assert_eq!(widen_dot(r"eval\(.\)"), format!(r"eval\({}\)", ANY_CHAR_OR_BYTE));
        assert_eq!(widen_dot(r"a\.b[.]c"), r"a\.b[.]c");
        assert_eq!(widen_dot(r"[].]x[^]]."), format!(r"[].]x[^]]{}", ANY_CHAR_OR_BYTE));
        assert_eq!(widen_dot(r"[[:alpha:].]."), format!(r"[[:alpha:].]{}", ANY_CHAR_OR_BYTE));
    }

    #[test]
    fn test_source_is_kept_as_written() {
        let pattern = SinkPattern::new("eval", r"eval\(.\)").unwrap();
        assert_eq!(pattern.source(), r"eval\(.\)");
    }

    #[test]
    fn test_dot_matches_single_invalid_byte() {
        let pattern = SinkPattern::new("eval", r"eval\(.\)").unwrap();
        assert!(pattern.regex().is_match(b"eval(\xe9)"));
        assert!(pattern.regex().is_match("eval(é)".as_bytes()));
        assert!(!pattern.regex().is_match(b"eval(\xe9\xe9)"));
    }

    #[test]
    fn test_from_pairs_preserves_order() {
        let registry = PatternRegistry::from_pairs([("b", "b"), ("a", "a")]).unwrap();
        assert_eq!(registry.patterns()[0].name(), "b");
        assert_eq!(registry.patterns()[1].name(), "a");
    }
}
