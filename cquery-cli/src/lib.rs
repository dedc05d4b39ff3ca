//! cquery-fmt - configured query result formatter
//!
//! Reads configured targets as JSON Lines (one JSON array of targets per
//! line, one line per batch), builds their output records on a worker pool
//! and writes a single `proto`, `textproto` or `jsonproto` result.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod cli;
pub mod run;

pub use cli::Cli;
pub use run::{format_batches, read_batches, run};

use convenient_cquery::OutputError;

/// Errors reported by the formatter
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Malformed input batch
    #[error("Invalid batch on line {line}: {source}")]
    Input {
        /// 1-based input line
        line: usize,
        /// Parse failure
        source: serde_json::Error,
    },

    /// Record building or encoding failed
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Worker pool could not be started
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for formatter operations
pub type CliResult<T> = Result<T, CliError>;
