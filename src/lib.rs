//! archive-etl library
//!
//! This crate provides the core functionality for the `archive-etl` binary.
//! Keep the crate root minimal; implementation and tests live in their modules.
//!
//! ## Overview
//!
//! The pipeline reads a directory of ZIP archives full of small XML records and
//! writes two CSV tables, `id,level` and `id,object_name`:
//!
//! - [`source`] - Enumerates archive members lazily as work units
//! - [`parser`] - Extracts a [`models::Record`] from each payload and projects it to rows
//! - [`pool`] - Runs extraction on a bounded worker pool with cooperative cancellation
//! - [`sink`] - Single writer thread appending row batches to both CSV files
//! - [`pipeline`] - Wires the stages together and produces the run summary
//! - [`cli`] - Command-line interface
//! - [`config`] - Pipeline settings, optionally loaded from TOML
//! - [`errors`] - Fatal errors and per-unit failure types
//!
//! ## Example Usage
//!
//! ```no_run
//! use archive_etl::config::ResolvedConfig;
//! use archive_etl::pipeline::run_pipeline;
//! use archive_etl::pool::CancelToken;
//! use std::path::Path;
//!
//! # fn example() -> archive_etl::errors::AppResult<()> {
//! let summary = run_pipeline(
//!     Path::new("zip"),
//!     Path::new("csv"),
//!     &ResolvedConfig::default(),
//!     &CancelToken::new(),
//! )?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod pool;
pub mod sink;
pub mod source;
pub mod utils;
