//! loopabs-cbmc: run CBMC on synthesized harnesses
//!
//! Each harness is written to its own temporary file and checked by exactly
//! one CBMC process under a hard wall-clock limit. The process is killed on
//! expiry. Output is classified as VERIFIED, REFUTED, TIMEOUT or ERROR; loops
//! that never produced a harness are SKIPPED.

pub mod config;
pub mod detection;
pub mod error;
pub mod outcome;
pub mod runner;

pub use config::CbmcConfig;
pub use detection::{detect_cbmc, resolve_binary, CbmcDetection};
pub use error::CbmcError;
pub use outcome::{classify_output, log_tail, VerificationOutcome, VerificationStatus};
pub use runner::{CbmcOutput, CbmcRunner};
