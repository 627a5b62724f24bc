//! Error types for the pipeline driver

use loopabs_invariant::InvariantError;
use loopabs_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop a stage as a whole. Per-loop failures are recorded
/// in the loop's own record instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no input file configured for the extract stage")]
    NoInput,

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate loop id `{0}` in input")]
    DuplicateId(String),

    #[error("invariant source unavailable: {0}")]
    Invariant(#[from] InvariantError),

    #[error("verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
