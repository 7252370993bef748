use crate::errors::{AppError, AppResult, UnitFailure};
use crate::models::{InputFormat, RowBatch};
use crate::parser::{emit, extract};
use crate::source::SourceItem;
use rayon::iter::{ParallelBridge, ParallelIterator};
use rayon::ThreadPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation flag shared between the driver, the pool and signal handlers.
///
/// Once cancelled, no new work unit is dispatched; units already running finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of exactly one work unit.
#[derive(Debug)]
pub enum WorkResult {
    Rows {
        archive: String,
        member: String,
        batch: RowBatch,
    },
    Failed(UnitFailure),
}

/// Runs extractor and emitter for one source item. Consumes the payload.
pub fn process_item(item: SourceItem, format: InputFormat) -> WorkResult {
    let unit = match item {
        Ok(unit) => unit,
        Err(failure) => return WorkResult::Failed(failure),
    };

    match extract(format, &unit.payload) {
        Ok(record) => WorkResult::Rows {
            archive: unit.archive,
            member: unit.member,
            batch: emit(record),
        },
        Err(e) => WorkResult::Failed(UnitFailure::extraction(unit.archive, unit.member, &e)),
    }
}

/// Fixed-size pool of extraction workers.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
    format: InputFormat,
}

impl WorkerPool {
    /// Builds a pool with `threads` workers (at least one).
    pub fn new(threads: usize, format: InputFormat) -> AppResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("etl-worker-{i}"))
            .build()
            .map_err(|e| AppError::WorkerPool(e.to_string()))?;
        Ok(Self {
            pool,
            threads,
            format,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Processes `units` on the pool and hands each `WorkResult` to `on_result`.
    ///
    /// Units are pulled from the iterator one at a time as workers free up, so at
    /// most one unit per worker is in memory. Every dispatched unit produces
    /// exactly one call to `on_result`; `on_result` may block (that is how a slow
    /// sink throttles the workers).
    ///
    /// Dispatch stops when `cancel` is set or when `on_result` returns an error;
    /// in both cases units already running are allowed to finish. The first error
    /// from `on_result` is returned.
    pub fn run<I, F>(&self, units: I, cancel: &CancelToken, on_result: F) -> AppResult<()>
    where
        I: Iterator<Item = SourceItem> + Send,
        F: Fn(WorkResult) -> AppResult<()> + Sync + Send,
    {
        let format = self.format;
        let mut units = units;
        let dispatch = std::iter::from_fn(move || {
            if cancel.is_cancelled() {
                None
            } else {
                units.next()
            }
        });

        debug!(threads = self.threads, "Worker pool started");
        let outcome = self.pool.install(|| {
            dispatch
                .par_bridge()
                .try_for_each(|item| on_result(process_item(item, format)))
        });
        debug!(cancelled = cancel.is_cancelled(), "Worker pool drained");
        outcome
    }
}
