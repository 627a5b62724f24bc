//! Configuration for the abstraction stage

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which variable classifier to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierChoice {
    /// AST facts when the record carries them, textual patterns otherwise
    #[default]
    Auto,
    /// Always use shallow textual pattern matching
    Textual,
    /// Always use AST facts (records without facts classify as empty)
    Facts,
}

/// Configuration for classification, gating and rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbstractionConfig {
    /// Classifier selection policy
    pub classifier: ClassifierChoice,

    /// Globals and special identifiers whose assignment disqualifies a loop
    pub reserved_identifiers: BTreeSet<String>,

    /// Call-like identifiers that do not count as function calls
    pub control_identifiers: BTreeSet<String>,
}

impl Default for AbstractionConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierChoice::Auto,
            reserved_identifiers: [
                "errno", "environ", "__environ", "stdin", "stdout", "stderr", "optarg", "optind",
                "opterr", "optopt",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            control_identifiers: ["assert"].into_iter().map(String::from).collect(),
        }
    }
}

impl AbstractionConfig {
    /// Use a specific classifier
    pub fn with_classifier(mut self, classifier: ClassifierChoice) -> Self {
        self.classifier = classifier;
        self
    }
}
