//! loopabs: pointer-loop abstraction and verification pipeline
//!
//! Runs loop records through four stages over a keyed output directory:
//!
//! - `extract`: load the extraction collaborator's loop records
//! - `abstract`: rewrite pointer idioms into index form, or reject the loop
//! - `verify`: synthesize a harness per abstracted loop and run CBMC on it
//! - `clean`: merge verified loops into `dataset.json`
//!
//! Per-loop failures never stop a batch; they are recorded and counted.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;

pub use config::{PipelineConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use error::PipelineError;
pub use pipeline::{Pipeline, Step, VerifiedRecord};
pub use report::{AbstractionSummary, BatchReport, RunSummary};

