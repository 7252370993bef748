use crate::constants::{
    DEFAULT_DETAIL_FILE, DEFAULT_SCALAR_FILE, MIN_QUEUE_DEPTH, QUEUE_DEPTH_PER_WORKER,
};
use crate::errors::{AppError, AppResult};
use crate::models::InputFormat;
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

/// Pipeline configuration with every value filled in.
///
/// Can be deserialized from TOML; missing keys take the defaults below and
/// unknown keys are rejected to catch typos.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolvedConfig {
    /// Number of extraction workers.
    /// When set to 0 (default), automatically uses available_parallelism().
    pub workers: usize,
    /// Capacity of the hand-off queue between workers and the sink writer.
    /// When set to 0 (default), uses twice the worker count with a floor of 16.
    pub queue_depth: usize,
    /// File name of the `id,level` table inside the output directory
    pub scalar_file: String,
    /// File name of the `id,object_name` table inside the output directory
    pub detail_file: String,
    /// Format of the archive members
    pub format: InputFormat,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            workers: 0, // 0 means auto-detect via available_parallelism()
            queue_depth: 0,
            scalar_file: DEFAULT_SCALAR_FILE.to_string(),
            detail_file: DEFAULT_DETAIL_FILE.to_string(),
            format: InputFormat::Xml,
        }
    }
}

impl ResolvedConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the file cannot be read, the TOML is malformed,
    /// unknown keys are present, or the sink file names are invalid.
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AppError::InvalidInput(format!(
                "Failed to read config {}: {e}",
                path.display()
            ))
        })?;
        let config: ResolvedConfig = toml::from_str(&contents)
            .map_err(|e| AppError::InvalidInput(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        for name in [&self.scalar_file, &self.detail_file] {
            if name.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "Sink file names must not be empty".into(),
                ));
            }
            if name.contains('/') || name.contains('\\') {
                return Err(AppError::InvalidInput(format!(
                    "Sink file name '{name}' must not contain a path separator"
                )));
            }
        }
        if self.scalar_file == self.detail_file {
            return Err(AppError::InvalidInput(
                "Scalar and detail sinks must use different files".into(),
            ));
        }
        Ok(())
    }

    /// Worker count to actually use.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        }
    }

    /// Hand-off queue capacity to actually use.
    pub fn effective_queue_depth(&self) -> usize {
        if self.queue_depth > 0 {
            self.queue_depth
        } else {
            (self.effective_workers() * QUEUE_DEPTH_PER_WORKER).max(MIN_QUEUE_DEPTH)
        }
    }
}
