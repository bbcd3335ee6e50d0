//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `SS_*`
//! environment variables, and merging file configurations with proper
//! precedence rules.

use crate::error::ScanError;
use crate::patterns::{get_preset_patterns, PatternEntry};
use crate::types::RateMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted concurrency cap.
pub const MAX_CONCURRENCY: usize = 1000;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Custom sink patterns; when present they replace the preset registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternEntry>>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Default concurrency cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Default dispatch rate (requests per second)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,

    /// Rate gate mode ("startup" or "per-request")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_mode: Option<String>,

    /// Built-in pattern preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Per-fetch timeout (as string, e.g., "5s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Secondary output file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// User-Agent header for requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which config files were found
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::FileError` if the file is missing or unreadable and
    /// `ScanError::ConfigError` if it fails to parse or validate.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ScanError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScanError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ScanError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is loaded first, then the home directory file, then the
    /// local file; later files override earlier ones field by field.
    pub fn discover_and_load(&self) -> Result<FileConfig, ScanError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping config file");
                }
            }
        }

        if self.verbose {
            for path in &loaded_files {
                tracing::info!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    /// Local configuration file in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./sink-scan.toml", "./.sink-scan.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Configuration file in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".sink-scan.toml", "sink-scan.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// XDG configuration file.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("sink-scan").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    ///
    /// A pattern list is replaced as a whole, never merged entry by entry.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(mut lower_defaults), Some(higher_defaults)) => {
                    if higher_defaults.concurrency.is_some() {
                        lower_defaults.concurrency = higher_defaults.concurrency;
                    }
                    if higher_defaults.rate.is_some() {
                        lower_defaults.rate = higher_defaults.rate;
                    }
                    if higher_defaults.rate_mode.is_some() {
                        lower_defaults.rate_mode = higher_defaults.rate_mode;
                    }
                    if higher_defaults.preset.is_some() {
                        lower_defaults.preset = higher_defaults.preset;
                    }
                    if higher_defaults.timeout.is_some() {
                        lower_defaults.timeout = higher_defaults.timeout;
                    }
                    if higher_defaults.output.is_some() {
                        lower_defaults.output = higher_defaults.output;
                    }
                    if higher_defaults.user_agent.is_some() {
                        lower_defaults.user_agent = higher_defaults.user_agent;
                    }
                    Some(lower_defaults)
                }
                (None, higher_defaults) => higher_defaults,
                (lower_defaults, None) => lower_defaults,
            },
            patterns: higher.patterns.or(lower.patterns),
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), ScanError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                    return Err(ScanError::config(format!(
                        "Concurrency must be between 1 and {}",
                        MAX_CONCURRENCY
                    )));
                }
            }

            if defaults.rate == Some(0) {
                return Err(ScanError::config("Rate must be at least 1"));
            }

            if let Some(mode) = &defaults.rate_mode {
                mode.parse::<RateMode>().map_err(ScanError::config)?;
            }

            if let Some(preset) = &defaults.preset {
                if get_preset_patterns(preset).is_none() {
                    return Err(ScanError::config(format!(
                        "Unknown pattern preset '{}'",
                        preset
                    )));
                }
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(ScanError::config(format!(
                        "Invalid timeout format '{}'. Use format like '500ms', '5s', '2m'",
                        timeout_str
                    )));
                }
            }
        }

        if let Some(patterns) = &config.patterns {
            if patterns.is_empty() {
                return Err(ScanError::config("Pattern list cannot be empty"));
            }
            for entry in patterns {
                if entry.name.trim().is_empty() {
                    return Err(ScanError::config("Pattern names cannot be empty"));
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub rate: Option<u32>,
    pub rate_mode: Option<RateMode>,
    pub preset: Option<String>,
    pub timeout: Option<Duration>,
    pub output: Option<String>,
    pub patterns: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from `SS_*` environment variables.
///
/// Invalid values are ignored, with a warning when `verbose` is set.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    let mut env_config = EnvConfig::default();

    // SS_CONCURRENCY - concurrency cap
    if let Ok(val) = env::var("SS_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if (1..=MAX_CONCURRENCY).contains(&concurrency) => {
                env_config.concurrency = Some(concurrency);
                if verbose {
                    tracing::info!("using SS_CONCURRENCY={}", concurrency);
                }
            }
            _ => {
                if verbose {
                    tracing::warn!(
                        "invalid SS_CONCURRENCY='{}', must be 1-{}",
                        val,
                        MAX_CONCURRENCY
                    );
                }
            }
        }
    }

    // SS_RATE - dispatch rate
    if let Ok(val) = env::var("SS_RATE") {
        match val.trim().parse::<u32>() {
            Ok(rate) if rate >= 1 => {
                env_config.rate = Some(rate);
                if verbose {
                    tracing::info!("using SS_RATE={}", rate);
                }
            }
            _ => {
                if verbose {
                    tracing::warn!("invalid SS_RATE='{}', must be at least 1", val);
                }
            }
        }
    }

    // SS_RATE_MODE - startup or per-request
    if let Ok(val) = env::var("SS_RATE_MODE") {
        match val.parse::<RateMode>() {
            Ok(mode) => {
                env_config.rate_mode = Some(mode);
                if verbose {
                    tracing::info!("using SS_RATE_MODE={}", mode);
                }
            }
            Err(e) => {
                if verbose {
                    tracing::warn!("invalid SS_RATE_MODE: {}", e);
                }
            }
        }
    }

    // SS_PRESET - built-in pattern preset
    if let Ok(preset) = env::var("SS_PRESET") {
        if get_preset_patterns(&preset).is_some() {
            env_config.preset = Some(preset.trim().to_lowercase());
            if verbose {
                tracing::info!("using SS_PRESET={}", preset);
            }
        } else if verbose {
            tracing::warn!("unknown SS_PRESET='{}'", preset);
        }
    }

    // SS_TIMEOUT - per-fetch deadline
    if let Ok(timeout_str) = env::var("SS_TIMEOUT") {
        if let Some(timeout) = parse_timeout_string(&timeout_str) {
            env_config.timeout = Some(timeout);
            if verbose {
                tracing::info!("using SS_TIMEOUT={}", timeout_str);
            }
        } else if verbose {
            tracing::warn!(
                "invalid SS_TIMEOUT='{}', use format like '500ms', '5s', '2m'",
                timeout_str
            );
        }
    }

    // SS_OUTPUT, SS_PATTERNS, SS_CONFIG - paths
    for (name, slot) in [
        ("SS_OUTPUT", &mut env_config.output),
        ("SS_PATTERNS", &mut env_config.patterns),
        ("SS_CONFIG", &mut env_config.config),
    ] {
        if let Ok(path) = env::var(name) {
            if !path.trim().is_empty() {
                if verbose {
                    tracing::info!("using {}={}", name, path);
                }
                *slot = Some(path);
            }
        }
    }

    env_config
}

/// Parse a duration string like "500ms", "5s", "2m" (bare numbers are seconds).
///
/// Zero durations are rejected.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let duration = if let Some(ms) = timeout_str.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        timeout_str.parse::<u64>().ok().map(Duration::from_secs)
    }?;

    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}
