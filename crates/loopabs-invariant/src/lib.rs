//! loopabs-invariant: candidate invariant collaborators
//!
//! ## Sources
//!
//! - [`BoundsOnly`]: proposes nothing, so harnesses assert that every index
//!   is non-negative
//! - [`InvariantTable`]: precomputed invariants keyed by loop id
//! - [`LlmInvariantSource`]: an OpenAI-compatible chat endpoint (DeepSeek by
//!   default, key read from `DEEPSEEK_API_KEY`)
//!
//! Every candidate is untrusted data. It is only substituted into a fixed
//! assertion template after sanitisation by the harness synthesizer.

mod config;
mod error;
mod llm;
mod source;

pub use config::{InvariantConfig, LlmConfig, SourceKind};
pub use error::InvariantError;
pub use llm::{build_prompt, parse_candidate, LlmInvariantSource};
pub use source::{create_source, BoundsOnly, InvariantSource, InvariantTable};
