//! loopabs-core: sound pointer-to-index abstraction of C loop fragments
//!
//! A loop extracted from C source is first run through a disqualification
//! gate, then its pointer variables are classified, every pointer idiom is
//! rewritten into index form over a backing array, and the result is checked
//! for completeness. A loop is either abstracted in full or not at all.
//!
//! ```
//! use loopabs_core::{abstract_loop, AbstractionConfig, LoopRecord};
//!
//! let record = LoopRecord::new("strlen_1", "for (; *s; s++);");
//! let result = abstract_loop(&record, &AbstractionConfig::default()).unwrap();
//! assert_eq!(result.abstracted_body.as_deref(), Some("for (; arr_s[s_idx]; s_idx++);"));
//! ```

pub mod abstraction;
pub mod classify;
pub mod completeness;
pub mod config;
pub mod error;
pub mod gate;
pub mod lexer;
pub mod record;
pub mod rewrite;

pub use abstraction::{abstract_loop, AbstractionResult, Abstractor};
pub use classify::{
    classifier_for, FactClassifier, TextualClassifier, VariableClassification, VariableClassifier,
};
pub use completeness::residual;
pub use config::{AbstractionConfig, ClassifierChoice};
pub use error::CoreError;
pub use gate::Rejection;
pub use record::{LoopKind, LoopRecord, UsageFacts};
pub use rewrite::{rewrite_order, rewrite_variable, IdiomKind, RuleApplication};
