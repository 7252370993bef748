//! Single-writer output for the two row tables.
//!
//! Workers never touch the files. They push whole [`RowBatch`]es into a bounded
//! channel; one writer thread owns both [`SinkFile`]s and appends each batch in
//! full before taking the next, so rows from different batches cannot interleave
//! and every received batch is written exactly once. A full channel blocks the
//! submitting worker, which keeps memory bounded by the queue depth.

use crate::constants::{DETAIL_HEADER, SCALAR_HEADER};
use crate::errors::{AppError, AppResult};
use crate::models::RowBatch;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Append-only CSV file with a fixed header.
///
/// The header is written when the file is opened, only if the file is missing
/// or empty, so reopening an existing sink appends rows without repeating it.
pub struct SinkFile<W: Write = File> {
    path: PathBuf,
    writer: csv::Writer<W>,
    rows: u64,
}

impl SinkFile<File> {
    pub fn open(path: &Path, header: [&str; 2]) -> AppResult<Self> {
        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                AppError::SinkWriteFailure(format!(
                    "Failed to open sink file {}: {e}",
                    path.display()
                ))
            })?;

        let sink = Self::from_writer(path, file, needs_header.then_some(header))?;
        debug!(
            sink = %path.display(),
            header_written = needs_header,
            "Sink file opened"
        );
        Ok(sink)
    }
}

impl<W: Write> SinkFile<W> {
    /// Wraps an arbitrary writer; `path` only labels errors and logs.
    pub fn from_writer(path: &Path, inner: W, header: Option<[&str; 2]>) -> AppResult<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        if let Some(header) = header {
            writer.write_record(header)?;
            writer.flush().map_err(|e| sink_io_error(path, e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn append<'a, R, I>(&mut self, rows: I) -> AppResult<()>
    where
        R: Serialize + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for row in rows {
            self.writer.serialize(row).map_err(|e| {
                AppError::SinkWriteFailure(format!(
                    "Failed to append to {}: {e}",
                    self.path.display()
                ))
            })?;
            self.rows += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        self.writer
            .flush()
            .map_err(|e| sink_io_error(&self.path, e))
    }
}

fn sink_io_error(path: &Path, err: std::io::Error) -> AppError {
    AppError::SinkWriteFailure(format!("Failed to flush {}: {err}", path.display()))
}

/// Output locations of the two sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkPaths {
    pub scalar: PathBuf,
    pub detail: PathBuf,
}

impl SinkPaths {
    pub fn new(output_dir: &Path, scalar_file: &str, detail_file: &str) -> Self {
        Self {
            scalar: output_dir.join(scalar_file),
            detail: output_dir.join(detail_file),
        }
    }
}

/// Rows written by the writer thread during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub batches: u64,
    pub scalar_rows: u64,
    pub detail_rows: u64,
}

/// The writer side: owns both files and drains the hand-off queue.
struct SinkWriter<W: Write> {
    scalar: SinkFile<W>,
    detail: SinkFile<W>,
    batches: u64,
}

impl<W: Write> SinkWriter<W> {
    fn write_batch(&mut self, batch: &RowBatch) -> AppResult<()> {
        self.scalar.append(std::iter::once(&batch.scalar))?;
        self.detail.append(&batch.details)?;
        self.batches += 1;
        Ok(())
    }

    /// Runs until every sender is dropped and the queue is empty.
    fn drain(mut self, rx: Receiver<RowBatch>) -> AppResult<SinkReport> {
        for batch in rx {
            if let Err(e) = self.write_batch(&batch) {
                error!(error = %e, id = batch.scalar.id.as_str(), "Sink writer stopped");
                return Err(e);
            }
        }

        self.scalar.flush()?;
        self.detail.flush()?;

        let report = SinkReport {
            batches: self.batches,
            scalar_rows: self.scalar.rows(),
            detail_rows: self.detail.rows(),
        };
        debug!(
            batches = report.batches,
            scalar_sink = %self.scalar.path().display(),
            detail_sink = %self.detail.path().display(),
            "Sink writer finished"
        );
        Ok(report)
    }
}

/// Cloneable producer handle given to workers.
#[derive(Clone)]
pub struct SinkHandle {
    tx: Sender<RowBatch>,
}

impl SinkHandle {
    /// Queues one batch for writing, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `SinkWriteFailure` if the writer has stopped.
    pub fn submit(&self, batch: RowBatch) -> AppResult<()> {
        self.tx
            .send(batch)
            .map_err(|_| AppError::SinkWriteFailure("sink writer is no longer running".into()))
    }
}

/// Owns the writer thread for the lifetime of a run.
pub struct SinkCoordinator {
    handle: SinkHandle,
    writer: JoinHandle<AppResult<SinkReport>>,
}

impl SinkCoordinator {
    /// Opens both sinks (writing headers where needed) and starts the writer thread.
    ///
    /// `queue_depth` bounds the number of batches waiting for the writer.
    pub fn start(paths: &SinkPaths, queue_depth: usize) -> AppResult<Self> {
        let scalar = SinkFile::open(&paths.scalar, SCALAR_HEADER)?;
        let detail = SinkFile::open(&paths.detail, DETAIL_HEADER)?;
        Self::spawn(scalar, detail, queue_depth)
    }

    /// Starts the writer thread over two already opened sinks.
    pub fn spawn<W>(scalar: SinkFile<W>, detail: SinkFile<W>, queue_depth: usize) -> AppResult<Self>
    where
        W: Write + Send + 'static,
    {
        let scalar_sink = scalar.path().display().to_string();
        let detail_sink = detail.path().display().to_string();
        let sink_writer = SinkWriter {
            scalar,
            detail,
            batches: 0,
        };

        let (tx, rx) = bounded(queue_depth.max(1));
        let writer = thread::Builder::new()
            .name("sink-writer".to_string())
            .spawn(move || sink_writer.drain(rx))?;

        info!(
            queue_depth = queue_depth.max(1),
            scalar_sink = scalar_sink.as_str(),
            detail_sink = detail_sink.as_str(),
            "Sink writer started"
        );

        Ok(Self {
            handle: SinkHandle { tx },
            writer,
        })
    }

    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }

    pub fn submit(&self, batch: RowBatch) -> AppResult<()> {
        self.handle.submit(batch)
    }

    /// Closes the queue, waits for the writer to drain it and returns its report.
    ///
    /// Handles obtained through [`SinkCoordinator::handle`] must be dropped first,
    /// otherwise the writer keeps waiting for more batches.
    pub fn finish(self) -> AppResult<SinkReport> {
        drop(self.handle);
        self.writer
            .join()
            .map_err(|_| AppError::SinkWriteFailure("sink writer thread panicked".into()))?
    }
}
