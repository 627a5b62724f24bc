//! Error types for loop abstraction

use thiserror::Error;

/// Errors that stop abstraction of a loop outright.
///
/// Loops that merely cannot be abstracted soundly are not errors; they come
/// back as an `AbstractionResult` carrying a `Rejection`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier for rewriting: {0:?}")]
    InvalidIdentifier(String),

    #[error("failed to build rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}
