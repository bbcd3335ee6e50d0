//! Sink pattern definitions.
//!
//! This module contains the compiled pattern registry, the built-in
//! presets and loading of user-supplied pattern files.

/// Compiled registry and built-in presets
pub mod registry;

/// TOML pattern file loading
pub mod file;

pub use file::{entries_to_registry, load_pattern_file, parse_pattern_file, PatternEntry};
pub use registry::{
    get_available_presets, get_preset_patterns, PatternRegistry, PatternRegistryBuilder,
    SinkPattern, DEFAULT_PRESET,
};
