//! Human-facing display logic for the sink-scan CLI.
//!
//! Findings go to stdout in a fixed, greppable format written by the
//! library's reporter. Everything in this module is decoration around that
//! stream (headers, summaries, pattern listings) and goes to stderr, except
//! `--list-patterns`, which is the whole output of its run.

use console::{pad_str, style, Alignment};
use sink_scan_lib::{PatternRegistry, PipelineSummary, ScanConfig};

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a dim run header to stderr (verbose mode).
pub fn print_header(config: &ScanConfig, registry: &PatternRegistry) {
    eprintln!(
        "{} {}",
        style("sink-scan").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
    );

    let mut meta_parts = vec![
        format!("Concurrency: {}", config.concurrency),
        format!("Rate: {}/s ({})", config.rate, config.rate_mode),
        format!("Patterns: {}", registry.len()),
    ];
    if let Some(timeout) = config.timeout {
        meta_parts.push(format!("Timeout: {:?}", timeout));
    }
    if let Some(output) = &config.output {
        meta_parts.push(format!("Output: {}", output.display()));
    }

    eprintln!("{}", style(meta_parts.join(" | ")).dim());
    eprintln!();
}

// ── Pattern listing ──────────────────────────────────────────────────────────

/// Print the active registry, one pattern per line, to stdout.
pub fn print_patterns(registry: &PatternRegistry, source: &str) {
    println!();
    println!(
        "{} {}",
        style("Active sink patterns").yellow().bold(),
        style(format!("({})", source)).dim()
    );
    println!();

    for pattern in registry.iter() {
        println!(
            "  {}  {}",
            style(pad_str(pattern.name(), 20, Alignment::Left, None)).green().bold(),
            pattern.source(),
        );
    }

    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the end-of-run counts to stderr.
pub fn print_summary(summary: &PipelineSummary) {
    eprintln!(
        "{}",
        style("────────────────────────────────────────────────────").dim()
    );
    eprintln!(
        "{} URL{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(summary.dispatched).bold(),
        if summary.dispatched == 1 { "" } else { "s" },
        summary.duration.as_secs_f64(),
        style("|").dim(),
        style(format!(
            "{} with findings ({} total)",
            summary.reported, summary.occurrences
        ))
        .red(),
        style("|").dim(),
        style(format!("{} clean", summary.clean)).green(),
        style("|").dim(),
        style(format!("{} unreachable", summary.failed)).yellow(),
    );
}
