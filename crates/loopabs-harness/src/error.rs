//! Error types for harness synthesis

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    /// The loop has no abstracted body to wrap
    #[error("loop {0} was not abstracted")]
    NotAbstracted(String),

    /// A candidate invariant failed sanitisation
    #[error("invalid invariant: {0}")]
    InvalidInvariant(String),

    #[error("array capacity must be positive")]
    ZeroCapacity,
}
