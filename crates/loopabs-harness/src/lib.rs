//! loopabs-harness: CBMC verification units for abstracted loops
//!
//! Wraps an abstracted loop body in a closed C function: index variables and
//! fixed-capacity backing arrays for every pointer, declarations for every
//! scalar, environment assumptions, and the candidate invariant asserted
//! immediately before and after the loop.

pub mod config;
pub mod error;
pub mod invariant;
pub mod scalars;
pub mod synth;

pub use config::{AssumptionPolicy, HarnessConfig};
pub use error::HarnessError;
pub use invariant::{default_invariant, sanitize_invariant};
pub use scalars::{discover_scalars, Scalar, ScalarInit};
pub use synth::{HarnessSource, HarnessSynthesizer, InvariantOrigin};
