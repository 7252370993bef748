use crate::config::ResolvedConfig;
use crate::constants::MAX_FAILURE_SAMPLES;
use crate::errors::{AppError, AppResult, FailureKind, UnitFailure};
use crate::pool::{CancelToken, WorkResult, WorkerPool};
use crate::sink::{SinkCoordinator, SinkPaths};
use crate::source::WorkSource;
use crate::utils::format_duration;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Units that produced a result (success or failure)
    pub processed: u64,
    pub succeeded: u64,
    pub failed_by_kind: BTreeMap<FailureKind, u64>,
    /// The first failures of the run, at most `MAX_FAILURE_SAMPLES` of them
    pub failures: Vec<UnitFailure>,
    pub scalar_rows: u64,
    pub detail_rows: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed(&self) -> u64 {
        self.failed_by_kind.values().sum()
    }

    pub fn failed_of(&self, kind: FailureKind) -> u64 {
        self.failed_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={}, succeeded={}, failed={}",
            self.processed,
            self.succeeded,
            self.failed()
        )?;
        if !self.failed_by_kind.is_empty() {
            let kinds: Vec<String> = self
                .failed_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            write!(f, " ({})", kinds.join(", "))?;
        }
        if self.cancelled {
            f.write_str(" [cancelled]")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct FailureLog {
    by_kind: BTreeMap<FailureKind, u64>,
    sample: Vec<UnitFailure>,
}

/// Counters shared by all workers while the pool runs.
#[derive(Default)]
struct RunStats {
    succeeded: AtomicU64,
    failures: Mutex<FailureLog>,
}

impl RunStats {
    fn record_failure(&self, failure: UnitFailure) {
        warn!(
            archive = failure.archive.as_str(),
            member = failure.member.as_str(),
            kind = %failure.kind,
            error = failure.message.as_str(),
            "Work unit failed"
        );
        let mut log = match self.failures.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        *log.by_kind.entry(failure.kind).or_insert(0) += 1;
        if log.sample.len() < MAX_FAILURE_SAMPLES {
            log.sample.push(failure);
        }
    }

    fn into_failures(self) -> FailureLog {
        match self.failures.into_inner() {
            Ok(failures) => failures,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Runs the whole extract-transform-load stage over `input_dir`.
///
/// # Workflow
///
/// 1. Opens the work source (the only step whose failure is reported before any output)
/// 2. Creates `output_dir` and opens both sinks, writing headers where needed
/// 3. Fans units across the worker pool; each successful record's rows go to the
///    sink writer through the bounded hand-off queue
/// 4. Closes the queue, waits for the writer to drain it and builds the summary
///
/// # Errors
///
/// - `SourceUnavailable` if the input directory cannot be listed
/// - `SinkWriteFailure` if the output directory or a sink cannot be written
/// - `WorkerPool` if the thread pool cannot be built
///
/// Per-unit failures are never errors; they are counted in the returned summary.
pub fn run_pipeline(
    input_dir: &Path,
    output_dir: &Path,
    config: &ResolvedConfig,
    cancel: &CancelToken,
) -> AppResult<RunSummary> {
    let start = Instant::now();
    let source = WorkSource::open(input_dir, config.format)?;

    fs::create_dir_all(output_dir).map_err(|e| {
        AppError::SinkWriteFailure(format!(
            "Failed to create output directory {}: {e}",
            output_dir.display()
        ))
    })?;
    let paths = SinkPaths::new(output_dir, &config.scalar_file, &config.detail_file);

    let workers = config.effective_workers();
    let queue_depth = config.effective_queue_depth();
    let pool = WorkerPool::new(workers, config.format)?;
    let sink = SinkCoordinator::start(&paths, queue_depth)?;

    drive(&source, &pool, sink, cancel, start)
}

/// Feeds every unit of `source` through `pool` into `sink` and builds the summary.
fn drive(
    source: &WorkSource,
    pool: &WorkerPool,
    sink: SinkCoordinator,
    cancel: &CancelToken,
    start: Instant,
) -> AppResult<RunSummary> {
    info!(
        input_dir = %source.dir().display(),
        archives = source.archives().len(),
        workers = pool.threads(),
        format = source.format().display_name(),
        "Starting extraction"
    );

    let stats = RunStats::default();
    let handle = sink.handle();
    let run_result = pool.run(source.units(), cancel, |result| match result {
        WorkResult::Rows { batch, .. } => {
            handle.submit(batch)?;
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        WorkResult::Failed(failure) => {
            stats.record_failure(failure);
            Ok(())
        }
    });
    drop(handle);

    // The writer's own error explains why submissions failed, so it wins.
    let report = sink.finish()?;
    run_result?;

    let succeeded = stats.succeeded.load(Ordering::Relaxed);
    let log = stats.into_failures();
    let failed: u64 = log.by_kind.values().sum();

    let summary = RunSummary {
        processed: succeeded + failed,
        succeeded,
        failed_by_kind: log.by_kind,
        failures: log.sample,
        scalar_rows: report.scalar_rows,
        detail_rows: report.detail_rows,
        cancelled: cancel.is_cancelled(),
        elapsed: start.elapsed(),
    };

    info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed(),
        scalar_rows = summary.scalar_rows,
        detail_rows = summary.detail_rows,
        cancelled = summary.cancelled,
        elapsed = format_duration(summary.elapsed).as_str(),
        "Extraction completed"
    );

    Ok(summary)
}
