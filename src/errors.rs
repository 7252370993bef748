use std::fmt;
use std::io;

use thiserror::Error;

/// Fatal errors that stop a run.
///
/// Per-record problems never surface as `AppError`; they are reported as
/// [`UnitFailure`] values and collected into the run summary.
#[derive(Debug, Error)]
pub enum AppError {
    /// The input directory does not exist or cannot be listed
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },
    /// The sink writer could not append rows, so no-loss can no longer be guaranteed
    #[error("sink write failure: {0}")]
    SinkWriteFailure(String),
    /// Invalid configuration or command-line value
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The worker thread pool could not be started
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::SinkWriteFailure(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Reasons the extractor rejects a record payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Not the expected structure at all; no id could be recovered
    #[error("malformed record: {0}")]
    Malformed(String),
    /// The structure parsed but a required scalar is absent or unusable
    #[error("record '{id}': field '{field}' {detail}")]
    MissingField {
        id: String,
        field: &'static str,
        detail: String,
    },
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::Malformed(_) => FailureKind::Malformed,
            ExtractError::MissingField { .. } => FailureKind::MissingField,
        }
    }
}

/// Tag of a per-unit failure, used to group failures in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    CorruptArchiveEntry,
    Malformed,
    MissingField,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::CorruptArchiveEntry => "CorruptArchiveEntry",
            FailureKind::Malformed => "Malformed",
            FailureKind::MissingField => "MissingField",
        };
        f.write_str(name)
    }
}

/// A unit of work that produced no rows, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Archive file name the unit came from
    pub archive: String,
    /// Member name inside the archive (empty when the whole archive is unreadable)
    pub member: String,
    pub kind: FailureKind,
    pub message: String,
}

impl UnitFailure {
    pub fn corrupt_entry(archive: &str, member: &str, message: impl Into<String>) -> Self {
        Self {
            archive: archive.to_string(),
            member: member.to_string(),
            kind: FailureKind::CorruptArchiveEntry,
            message: message.into(),
        }
    }

    pub fn extraction(archive: String, member: String, err: &ExtractError) -> Self {
        Self {
            archive,
            member,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.member.is_empty() {
            write!(f, "{} [{}]: {}", self.archive, self.kind, self.message)
        } else {
            write!(
                f,
                "{}:{} [{}]: {}",
                self.archive, self.member, self.kind, self.message
            )
        }
    }
}
