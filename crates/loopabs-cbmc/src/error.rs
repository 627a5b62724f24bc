//! Error types for CBMC invocation

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a verdict from CBMC.
///
/// These never escape the runner as `Err`; each one becomes a per-loop
/// `TIMEOUT` or `ERROR` outcome.
#[derive(Debug, Error)]
pub enum CbmcError {
    #[error("CBMC not found: {0}")]
    NotFound(String),

    #[error("failed to write harness: {0}")]
    HarnessWrite(#[source] std::io::Error),

    #[error("failed to start CBMC: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed while waiting for CBMC: {0}")]
    Wait(#[source] std::io::Error),

    #[error("CBMC timed out after {0:?}")]
    Timeout(Duration),
}
