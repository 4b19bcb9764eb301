#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-pipeline
//!
//! Parallel batch parsing of EDIFACT interchanges.
//!
//! Files are parsed on the blocking thread pool with bounded concurrency.
//! Each file is classified by a strictness level, and an acceptance policy
//! decides what a failing file does to the rest of the batch.

pub mod pipeline;
pub mod policies;

pub use pipeline::{
    FileResult, FileStatus, Pipeline, PipelineBatchResult, PipelineConfig, PipelineStats,
};
pub use policies::{AcceptancePolicy, StrictnessLevel};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a whole batch
///
/// Problems with individual files never surface here; they are recorded in
/// that file's [`FileResult`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("{operation} failed for '{path}': {message}")]
    Pipeline {
        operation: &'static str,
        path: String,
        message: String,
    },

    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("batch cancelled before it started")]
    Cancelled,
}

impl Error {
    pub fn pipeline(
        operation: &'static str,
        path: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::Pipeline {
            operation,
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn pipeline_error_names_operation_and_path() {
        let error = Error::pipeline("join", "orders.edi", "worker panicked");
        assert_eq!(
            error.to_string(),
            "join failed for 'orders.edi': worker panicked"
        );
    }

    #[test]
    fn io_error_keeps_its_source() {
        let source = std::fs::metadata("/path/that/does/not/exist")
            .expect_err("stat should fail");
        let error = Error::io("/path/that/does/not/exist", source);

        assert!(error.to_string().starts_with("cannot read '/path/that/does/not/exist'"));
        assert!(error.source().is_some());
    }
}
