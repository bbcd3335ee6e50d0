//! Core data types for sink scanning.
//!
//! This module defines the located findings produced by the scanner, the
//! configuration consumed by the pipeline, and the summary it returns.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One located match of a sink pattern within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Name of the sink pattern that matched (e.g. "innerHTML")
    pub keyword: String,

    /// 1-based line number
    pub line: usize,

    /// 1-based byte column of the match start
    pub column: usize,
}

impl Occurrence {
    pub fn new<K: Into<String>>(keyword: K, line: usize, column: usize) -> Self {
        Self {
            keyword: keyword.into(),
            line,
            column,
        }
    }
}

/// Ordered occurrences found in one document.
///
/// Ordering: ascending line, then registry registration order, then
/// ascending match start. The scanner is the only producer and emits
/// occurrences already in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanResult {
    occurrences: Vec<Occurrence>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, occurrence: Occurrence) {
        self.occurrences.push(occurrence);
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Occurrence> {
        self.occurrences.iter()
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn into_occurrences(self) -> Vec<Occurrence> {
        self.occurrences
    }
}

impl<'a> IntoIterator for &'a ScanResult {
    type Item = &'a Occurrence;
    type IntoIter = std::slice::Iter<'a, Occurrence>;

    fn into_iter(self) -> Self::IntoIter {
        self.occurrences.iter()
    }
}

/// How the dispatch rate is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateMode {
    /// A single `1/rate` delay before the first dispatch. Sustained
    /// throughput is then bounded only by the concurrency cap.
    #[default]
    Startup,

    /// A fixed-interval gate of period `1/rate` consulted before every
    /// slot acquisition.
    PerRequest,
}

impl std::str::FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "startup" => Ok(RateMode::Startup),
            "per-request" | "per_request" | "request" => Ok(RateMode::PerRequest),
            other => Err(format!(
                "Unknown rate mode '{}', use 'startup' or 'per-request'",
                other
            )),
        }
    }
}

impl std::fmt::Display for RateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateMode::Startup => write!(f, "startup"),
            RateMode::PerRequest => write!(f, "per-request"),
        }
    }
}

/// Configuration options for a scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum number of tasks fetching or scanning at once.
    /// Default: 1, Range: 1-1000
    pub concurrency: usize,

    /// Dispatch rate in requests per second, used to derive the rate gate.
    /// Default: 1
    pub rate: u32,

    /// How the rate gate is applied
    pub rate_mode: RateMode,

    /// Per-fetch deadline. `None` means fetches may take arbitrarily long.
    #[serde(skip)]
    pub timeout: Option<Duration>,

    /// Secondary output file, opened in append mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            rate: 1,
            rate_mode: RateMode::Startup,
            timeout: None,
            output: None,
            user_agent: format!("sink-scan/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ScanConfig {
    /// Set the concurrency cap, clamped to 1-1000.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 1000);
        self
    }

    /// Set the dispatch rate. Zero is raised to 1.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate.max(1);
        self
    }

    pub fn with_rate_mode(mut self, rate_mode: RateMode) -> Self {
        self.rate_mode = rate_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = Some(output.into());
        self
    }

    /// The gate interval derived from the dispatch rate.
    pub fn rate_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate.max(1)
    }
}

/// Counts collected over one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    /// URLs handed to a task
    pub dispatched: usize,

    /// Tasks whose non-empty result reached the reporter
    pub reported: usize,

    /// Tasks that fetched and scanned successfully with no findings
    pub clean: usize,

    /// Tasks abandoned because their fetch failed
    pub failed: usize,

    /// Total occurrences reported
    pub occurrences: usize,

    /// Failure reading the URL stream, if the run ended early because of one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_error: Option<String>,

    /// Failure inside the pipeline itself that stopped dispatching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_error: Option<String>,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl PipelineSummary {
    /// Tasks that reached a terminal state.
    pub fn completed(&self) -> usize {
        self.reported + self.clean + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_interval() {
        assert_eq!(ScanConfig::default().rate_interval(), Duration::from_secs(1));
        assert_eq!(
            ScanConfig::default().with_rate(4).rate_interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_builder_clamps() {
        let config = ScanConfig::default().with_concurrency(0).with_rate(0);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.rate, 1);
        assert_eq!(ScanConfig::default().with_concurrency(5000).concurrency, 1000);
    }

    #[test]
    fn test_rate_mode_parse() {
        assert_eq!("startup".parse::<RateMode>(), Ok(RateMode::Startup));
        assert_eq!("Per-Request".parse::<RateMode>(), Ok(RateMode::PerRequest));
        assert!("sometimes".parse::<RateMode>().is_err());
        assert_eq!(RateMode::PerRequest.to_string(), "per-request");
    }

    #[test]
    fn test_scan_result_serializes_as_list() {
        let mut result = ScanResult::new();
        result.push(Occurrence::new("eval", 2, 7));
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"[{"keyword":"eval","line":2,"column":7}]"#);
    }
}
