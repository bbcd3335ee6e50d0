//! Sink Scan CLI Application
//!
//! Reads newline-delimited URLs from stdin, fetches each one under a
//! concurrency cap and prints every DOM XSS sink pattern match with its
//! line and column.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use sink_scan_lib::{
    entries_to_registry, get_available_presets, get_preset_patterns, load_env_config,
    load_pattern_file, parse_timeout_string, ConfigManager, FileConfig, PatternEntry,
    PatternRegistry, RateMode, ScanConfig, ScanError, ScanPipeline, DEFAULT_PRESET,
    MAX_CONCURRENCY,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for sink-scan
#[derive(Parser, Debug)]
#[command(name = "sink-scan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scan URLs from stdin for DOM XSS sink patterns")]
#[command(
    long_about = "Scan URLs read from stdin (one per line) for textual DOM XSS sink patterns such as innerHTML assignment or document.write.\n\nEach page with findings prints a '[*] <url>' header followed by one line per match with its line and column."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Append findings to this file as well (created if absent)
    #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Output")]
    pub output: Option<PathBuf>,

    /// Print the run summary to stderr as JSON
    #[arg(long = "summary-json", help_heading = "Output")]
    pub summary_json: bool,

    /// Number of concurrent fetches (default: 1)
    #[arg(short = 't', long = "threads", value_name = "N", help_heading = "Performance")]
    pub threads: Option<usize>,

    /// Requests per second used for the rate gate (default: 1)
    #[arg(short = 'r', long = "rate", value_name = "N", help_heading = "Performance")]
    pub rate: Option<u32>,

    /// Apply the rate gate once at startup or before every request
    #[arg(long = "rate-mode", value_name = "MODE", help_heading = "Performance")]
    pub rate_mode: Option<RateMode>,

    /// Per-request timeout, e.g. 500ms, 10s, 2m (default: none)
    #[arg(long = "timeout", value_name = "DURATION", value_parser = parse_timeout_arg, help_heading = "Performance")]
    pub timeout: Option<Duration>,

    /// Built-in pattern preset: classic or broad
    #[arg(long = "preset", value_name = "NAME", help_heading = "Patterns")]
    pub preset: Option<String>,

    /// TOML file of [[patterns]] replacing the built-in preset
    #[arg(long = "patterns", value_name = "FILE", help_heading = "Patterns")]
    pub patterns: Option<PathBuf>,

    /// List the active patterns and exit
    #[arg(long = "list-patterns", help_heading = "Patterns")]
    pub list_patterns: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Log per-URL failures and task lifecycle to stderr
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Print a header and summary to stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Where the pattern registry comes from, after precedence is applied.
#[derive(Debug, Clone, PartialEq)]
enum PatternSource {
    Preset(String),
    File(PathBuf),
    Entries(Vec<PatternEntry>),
}

impl PatternSource {
    fn load(&self) -> Result<PatternRegistry, ScanError> {
        match self {
            PatternSource::Preset(name) => PatternRegistry::from_preset(name),
            PatternSource::File(path) => load_pattern_file(path),
            PatternSource::Entries(entries) => entries_to_registry(entries),
        }
    }

    fn describe(&self) -> String {
        match self {
            PatternSource::Preset(name) => format!("preset: {}", name),
            PatternSource::File(path) => format!("file: {}", path.display()),
            PatternSource::Entries(_) => "config file".to_string(),
        }
    }
}

fn parse_timeout_arg(value: &str) -> Result<Duration, String> {
    parse_timeout_string(value)
        .ok_or_else(|| format!("invalid duration '{}', use e.g. 500ms, 10s, 2m", value))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(&args);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Route logs to stderr; stdout carries only findings.
fn init_tracing(args: &Args) {
    let default_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(threads) = args.threads {
        if threads == 0 || threads > MAX_CONCURRENCY {
            return Err(format!(
                "Thread count must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
    }

    if args.rate == Some(0) {
        return Err("Rate must be at least 1 request per second".to_string());
    }

    if args.preset.is_some() && args.patterns.is_some() {
        return Err("Cannot specify both --preset and --patterns".to_string());
    }

    if let Some(preset) = &args.preset {
        if get_preset_patterns(preset).is_none() {
            return Err(format!(
                "Unknown preset '{}'. Available: {}",
                preset,
                get_available_presets().join(", ")
            ));
        }
    }

    Ok(())
}

/// Main scanning logic
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (config, pattern_source) = build_config(&args)?;
    let registry = pattern_source.load()?;

    if args.list_patterns {
        ui::print_patterns(&registry, &pattern_source.describe());
        return Ok(());
    }

    // Opens the output file; failure ends the run before any URL is read.
    let pipeline = ScanPipeline::from_config(config, registry)?;

    if args.verbose {
        ui::print_header(pipeline.config(), pipeline.registry());
    }

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let summary = pipeline.run(input).await;

    if args.verbose {
        ui::print_summary(&summary);
    }
    if args.summary_json {
        eprintln!("{}", serde_json::to_string(&summary)?);
    }

    // Reported, but work already done still counts as a normal exit.
    if let Some(input_error) = &summary.input_error {
        eprintln!("Error reading URLs: {}", input_error);
    }
    if let Some(internal_error) = &summary.internal_error {
        return Err(internal_error.clone().into());
    }

    Ok(())
}

/// Build the scan configuration and pattern source.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (SS_*)
/// 3. Explicit config file (--config or SS_CONFIG), otherwise discovered
///    config files (local, then home, then XDG)
/// 4. Built-in defaults
fn build_config(
    args: &Args,
) -> Result<(ScanConfig, PatternSource), Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    let explicit_path = args.config.clone().or_else(|| env_config.config.clone());
    let file_config = match explicit_path {
        Some(path) => {
            tracing::info!(path = %path, "using explicit config file");
            config_manager
                .load_file(&path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load().unwrap_or_default(),
    };

    let mut config = ScanConfig::default();
    let mut pattern_source = PatternSource::Preset(DEFAULT_PRESET.to_string());

    // Step 1: config file
    apply_file_config(&mut config, &mut pattern_source, file_config);

    // Step 2: environment
    if let Some(concurrency) = env_config.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(rate) = env_config.rate {
        config = config.with_rate(rate);
    }
    if let Some(rate_mode) = env_config.rate_mode {
        config.rate_mode = rate_mode;
    }
    if let Some(timeout) = env_config.timeout {
        config.timeout = Some(timeout);
    }
    if let Some(output) = &env_config.output {
        config.output = Some(PathBuf::from(output));
    }
    if let Some(patterns) = &env_config.patterns {
        pattern_source = PatternSource::File(PathBuf::from(patterns));
    } else if let Some(preset) = &env_config.preset {
        pattern_source = PatternSource::Preset(preset.clone());
    }

    // Step 3: CLI arguments
    if let Some(threads) = args.threads {
        config = config.with_concurrency(threads);
    }
    if let Some(rate) = args.rate {
        config = config.with_rate(rate);
    }
    if let Some(rate_mode) = args.rate_mode {
        config.rate_mode = rate_mode;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Some(timeout);
    }
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    if let Some(patterns) = &args.patterns {
        pattern_source = PatternSource::File(patterns.clone());
    } else if let Some(preset) = &args.preset {
        pattern_source = PatternSource::Preset(preset.to_lowercase());
    }

    Ok((config, pattern_source))
}

/// Merge a loaded `FileConfig` into the scan configuration.
///
/// The file has already been validated, so unparseable values cannot occur
/// here; they are skipped rather than re-reported.
fn apply_file_config(
    config: &mut ScanConfig,
    pattern_source: &mut PatternSource,
    file_config: FileConfig,
) {
    if let Some(defaults) = file_config.defaults {
        if let Some(concurrency) = defaults.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(rate) = defaults.rate {
            config.rate = rate.max(1);
        }
        if let Some(mode) = defaults.rate_mode.and_then(|m| m.parse::<RateMode>().ok()) {
            config.rate_mode = mode;
        }
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            config.timeout = Some(timeout);
        }
        if let Some(output) = defaults.output {
            config.output = Some(PathBuf::from(output));
        }
        if let Some(user_agent) = defaults.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(preset) = defaults.preset {
            *pattern_source = PatternSource::Preset(preset.to_lowercase());
        }
    }

    // An explicit pattern list beats a preset from the same file.
    if let Some(entries) = file_config.patterns {
        *pattern_source = PatternSource::Entries(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sink_scan_lib::DefaultsConfig;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["sink-scan"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_leave_overrides_unset() {
        let args = args(&[]);
        assert!(args.threads.is_none());
        assert!(args.rate.is_none());
        assert!(args.output.is_none());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_short_flags_parse() {
        let args = args(&["-o", "out.txt", "-t", "8", "-r", "20"]);
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert_eq!(args.threads, Some(8));
        assert_eq!(args.rate, Some(20));
    }

    #[test]
    fn test_rate_mode_and_timeout_parse() {
        let args = args(&["--rate-mode", "per-request", "--timeout", "750ms"]);
        assert_eq!(args.rate_mode, Some(RateMode::PerRequest));
        assert_eq!(args.timeout, Some(Duration::from_millis(750)));
    }

    #[test]
    fn test_invalid_args_rejected() {
        assert!(validate_args(&args(&["-t", "0"])).is_err());
        assert!(validate_args(&args(&["-r", "0"])).is_err());
        assert!(validate_args(&args(&["--preset", "nope"])).is_err());
        assert!(validate_args(&args(&["--preset", "broad", "--patterns", "p.toml"])).is_err());
        assert!(Args::try_parse_from(["sink-scan", "--timeout", "later"]).is_err());
        assert!(Args::try_parse_from(["sink-scan", "--rate-mode", "bursty"]).is_err());
    }

    #[test]
    fn test_file_config_applies() {
        let mut config = ScanConfig::default();
        let mut source = PatternSource::Preset(DEFAULT_PRESET.to_string());

        apply_file_config(
            &mut config,
            &mut source,
            FileConfig {
                defaults: Some(DefaultsConfig {
                    concurrency: Some(12),
                    rate: Some(3),
                    rate_mode: Some("per-request".to_string()),
                    preset: Some("Broad".to_string()),
                    timeout: Some("10s".to_string()),
                    ..Default::default()
                }),
                patterns: None,
            },
        );

        assert_eq!(config.concurrency, 12);
        assert_eq!(config.rate, 3);
        assert_eq!(config.rate_mode, RateMode::PerRequest);
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert_eq!(source, PatternSource::Preset("broad".to_string()));
    }

    #[test]
    fn test_file_patterns_beat_file_preset() {
        let mut config = ScanConfig::default();
        let mut source = PatternSource::Preset(DEFAULT_PRESET.to_string());
        let entries = vec![PatternEntry {
            name: "jquery-html".to_string(),
            regex: r"\.html\(".to_string(),
        }];

        apply_file_config(
            &mut config,
            &mut source,
            FileConfig {
                defaults: Some(DefaultsConfig {
                    preset: Some("broad".to_string()),
                    ..Default::default()
                }),
                patterns: Some(entries.clone()),
            },
        );

        assert_eq!(source, PatternSource::Entries(entries));
        assert_eq!(source.load().unwrap().patterns()[0].name(), "jquery-html");
    }
}
