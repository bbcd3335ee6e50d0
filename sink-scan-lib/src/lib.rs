//! # Sink Scan Library
//!
//! Fetches a stream of URLs under a concurrency cap and scans each document
//! for textual patterns ("sinks") associated with client-side script
//! injection, such as `innerHTML =` or `document.write(`.
//!
//! Matching is static and textual: documents are never parsed or executed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sink_scan_lib::{PatternRegistry, ScanConfig, ScanPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = PatternRegistry::from_preset("broad")?;
//!     let config = ScanConfig::default().with_concurrency(10);
//!     let pipeline = ScanPipeline::from_config(config, registry)?;
//!
//!     let urls = "https://example.com/\nhttps://example.org/app.js\n";
//!     let summary = pipeline.run(urls.as_bytes()).await;
//!     println!("{} pages with findings", summary.reported);
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - **Pattern registry**: immutable, named, compiled patterns (`patterns`)
//! - **Scanner**: line/column located matches over raw bytes (`scanner`)
//! - **Pipeline**: bounded-concurrency dispatch with a rate gate (`pipeline`)
//! - **Reporter**: atomic per-URL output blocks to stdout and an append file

pub use config::{
    load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig, EnvConfig, FileConfig,
    MAX_CONCURRENCY,
};
pub use error::ScanError;
pub use fetch::{Fetcher, HttpFetcher};
pub use patterns::{
    entries_to_registry, get_available_presets, get_preset_patterns, load_pattern_file,
    parse_pattern_file, PatternEntry, PatternRegistry, PatternRegistryBuilder, SinkPattern,
    DEFAULT_PRESET,
};
pub use pipeline::{PipelineState, ScanPipeline};
pub use reporter::{format_block, Reporter};
pub use scanner::scan_document;
pub use types::{Occurrence, PipelineSummary, RateMode, ScanConfig, ScanResult};
pub use utils::normalize_input_line;

mod config;
mod error;
mod fetch;
mod patterns;
mod pipeline;
mod reporter;
mod scanner;
mod types;
mod utils;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
