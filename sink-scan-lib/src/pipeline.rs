//! Bounded-concurrency fetch-and-scan pipeline.
//!
//! The pipeline reads URLs incrementally, takes one of `concurrency` slots per
//! URL (the reader blocks when none are free) and spawns a task that fetches,
//! scans and reports. Every task holds a `TaskGuard`; dropping it releases the
//! slot and decrements the outstanding counter, so each dispatched task does
//! both exactly once on every exit path, panics included.

use crate::error::ScanError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::patterns::PatternRegistry;
use crate::reporter::Reporter;
use crate::scanner::scan_document;
use crate::types::{PipelineSummary, RateMode, ScanConfig};
use crate::utils::normalize_input_line;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};

/// Process-wide counters for one pipeline.
#[derive(Debug)]
pub struct PipelineState {
    outstanding: AtomicUsize,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl PipelineState {
    fn new(capacity: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Dispatched tasks that have not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Concurrency slots not currently held by a task.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Total number of concurrency slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn admit(self: &Arc<Self>) -> Result<TaskGuard, ScanError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::internal("concurrency slot pool closed"))?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        Ok(TaskGuard {
            state: Arc::clone(self),
            _permit: permit,
        })
    }
}

/// Completion token held by a running task.
struct TaskGuard {
    state: Arc<PipelineState>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.state.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Reported(usize),
    Clean,
    Failed,
}

/// Fetch-scan pipeline over a stream of URLs.
///
/// # Example
///
/// ```rust,no_run
/// use sink_scan_lib::{PatternRegistry, ScanConfig, ScanPipeline};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ScanConfig::default().with_concurrency(8).with_rate(10);
///     let pipeline = ScanPipeline::from_config(config, PatternRegistry::default())?;
///
///     let input = tokio::io::BufReader::new(tokio::io::stdin());
///     let summary = pipeline.run(input).await;
///     eprintln!("{} URLs scanned", summary.dispatched);
///     Ok(())
/// }
/// ```
pub struct ScanPipeline {
    config: ScanConfig,
    registry: Arc<PatternRegistry>,
    fetcher: Arc<dyn Fetcher>,
    reporter: Arc<Reporter>,
    state: Arc<PipelineState>,
}

impl ScanPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: ScanConfig,
        registry: PatternRegistry,
        fetcher: Arc<dyn Fetcher>,
        reporter: Reporter,
    ) -> Self {
        let state = Arc::new(PipelineState::new(config.concurrency.max(1)));
        Self {
            config,
            registry: Arc::new(registry),
            fetcher,
            reporter: Arc::new(reporter),
            state,
        }
    }

    /// Build the production pipeline: HTTP fetcher, stdout reporter and, if
    /// configured, the append-mode output file.
    ///
    /// # Errors
    ///
    /// Fails before anything is dispatched if the output file cannot be
    /// opened or the HTTP client cannot be created.
    pub fn from_config(config: ScanConfig, registry: PatternRegistry) -> Result<Self, ScanError> {
        let mut reporter = Reporter::stdout();
        if let Some(path) = &config.output {
            reporter = reporter.with_file_sink(path)?;
        }
        let fetcher = Arc::new(HttpFetcher::with_config(&config)?);

        Ok(Self::new(config, registry, fetcher, reporter))
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Shared counters, observable while a run is in progress.
    pub fn state(&self) -> Arc<PipelineState> {
        Arc::clone(&self.state)
    }

    /// Scan every URL in `input` and wait for all dispatched tasks.
    ///
    /// A read error on `input` stops dispatching and is recorded in the
    /// summary; tasks already dispatched still run to completion.
    pub async fn run<R>(&self, mut input: R) -> PipelineSummary
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        let mut summary = PipelineSummary::default();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        let mut gate = self.open_rate_gate().await;

        tracing::info!(
            concurrency = self.state.capacity(),
            rate = self.config.rate,
            rate_mode = %self.config.rate_mode,
            patterns = self.registry.len(),
            "dispatch started"
        );

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    let err = ScanError::input_read(e.to_string());
                    tracing::warn!(error = %err, "stopped reading URLs");
                    summary.input_error = Some(err.to_string());
                    break;
                }
            }

            let Some(url) = normalize_input_line(&buf) else {
                continue;
            };

            if let Some(interval) = gate.as_mut() {
                interval.tick().await;
            }

            let guard = match self.state.admit().await {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::error!(error = %e, "cannot admit task");
                    summary.internal_error = Some(e.to_string());
                    break;
                }
            };

            summary.dispatched += 1;
            tracing::debug!(url = %url, outstanding = self.state.outstanding(), "dispatching");
            tasks.spawn(run_task(
                url,
                Arc::clone(&self.registry),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.reporter),
                guard,
            ));

            while let Some(joined) = tasks.try_join_next() {
                record(&mut summary, joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record(&mut summary, joined);
        }

        summary.duration = started.elapsed();
        tracing::info!(
            dispatched = summary.dispatched,
            reported = summary.reported,
            clean = summary.clean,
            failed = summary.failed,
            elapsed_ms = summary.duration.as_millis() as u64,
            "scan finished"
        );
        summary
    }

    /// Wait out the startup gate, or build the per-dispatch interval.
    async fn open_rate_gate(&self) -> Option<Interval> {
        let period = self.config.rate_interval();
        match self.config.rate_mode {
            RateMode::Startup => {
                tokio::time::sleep(period).await;
                None
            }
            RateMode::PerRequest => {
                let mut interval =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(interval)
            }
        }
    }
}

async fn run_task(
    url: String,
    registry: Arc<PatternRegistry>,
    fetcher: Arc<dyn Fetcher>,
    reporter: Arc<Reporter>,
    guard: TaskGuard,
) -> TaskOutcome {
    let _guard = guard;

    let body = match fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "fetch failed, dropping URL");
            return TaskOutcome::Failed;
        }
    };

    // Scanning and the blocking sink writes run off the async workers.
    let scanned = tokio::task::spawn_blocking(move || {
        let result = scan_document(&body, &registry);
        let count = result.len();
        match reporter.report(&url, &result) {
            Ok(true) => TaskOutcome::Reported(count),
            Ok(false) => TaskOutcome::Clean,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "failed to write report");
                TaskOutcome::Reported(count)
            }
        }
    })
    .await;

    scanned.unwrap_or_else(|e| {
        tracing::error!(error = %e, "scan task aborted");
        TaskOutcome::Failed
    })
}

fn record(summary: &mut PipelineSummary, joined: Result<TaskOutcome, JoinError>) {
    match joined {
        Ok(TaskOutcome::Reported(count)) => {
            summary.reported += 1;
            summary.occurrences += count;
        }
        Ok(TaskOutcome::Clean) => summary.clean += 1,
        Ok(TaskOutcome::Failed) => summary.failed += 1,
        Err(e) => {
            tracing::error!(error = %e, "task panicked");
            summary.failed += 1;
        }
    }
}
