//! Pointer-variable classification
//!
//! Two classifiers sit behind [`VariableClassifier`]: a shallow textual one
//! that looks for dereference, increment/decrement and subscript positions,
//! and one driven by the extractor's AST facts. Both only ever mark an
//! identifier as a pointer if it occurs in one of those idiom positions.

use crate::config::{AbstractionConfig, ClassifierChoice};
use crate::lexer::{
    identifiers, is_call_or_member, is_keyword, is_unary_position, next_non_ws, prev_non_ws,
    Ident,
};
use crate::record::LoopRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifiers of one loop split by how they will be treated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableClassification {
    /// Rewritten to `arr_<p>[<p>_idx ...]` form
    pub pointers: BTreeSet<String>,
    /// Pointer-typed per the facts but never used in an idiom position.
    /// Any occurrence of one of these fails the completeness check.
    pub opaque: BTreeSet<String>,
}

impl VariableClassification {
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty() && self.opaque.is_empty()
    }

    /// Every name the completeness check must not find in the output
    pub fn guarded(&self) -> impl Iterator<Item = &String> {
        self.pointers.iter().chain(self.opaque.iter())
    }
}

/// Strategy for deciding which identifiers are pointers
pub trait VariableClassifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Classify the identifiers of `record`; `masked` is its masked source
    fn classify(&self, record: &LoopRecord, masked: &str) -> VariableClassification;
}

/// Classifies by syntactic position alone
#[derive(Debug, Clone, Default)]
pub struct TextualClassifier {
    control_identifiers: BTreeSet<String>,
}

impl TextualClassifier {
    pub fn new(config: &AbstractionConfig) -> Self {
        Self {
            control_identifiers: config.control_identifiers.clone(),
        }
    }
}

impl VariableClassifier for TextualClassifier {
    fn name(&self) -> &'static str {
        "textual"
    }

    fn classify(&self, _record: &LoopRecord, masked: &str) -> VariableClassification {
        VariableClassification {
            pointers: idiom_identifiers(masked, &self.control_identifiers),
            opaque: BTreeSet::new(),
        }
    }
}

/// Classifies from extractor-supplied pointer types
#[derive(Debug, Clone, Default)]
pub struct FactClassifier {
    control_identifiers: BTreeSet<String>,
}

impl FactClassifier {
    pub fn new(config: &AbstractionConfig) -> Self {
        Self {
            control_identifiers: config.control_identifiers.clone(),
        }
    }
}

impl VariableClassifier for FactClassifier {
    fn name(&self) -> &'static str {
        "facts"
    }

    fn classify(&self, record: &LoopRecord, masked: &str) -> VariableClassification {
        let Some(facts) = &record.facts else {
            return VariableClassification::default();
        };
        let in_idiom = idiom_identifiers(masked, &self.control_identifiers);
        let present: BTreeSet<&str> = identifiers(masked).map(|i| i.text).collect();

        let mut result = VariableClassification::default();
        for var in &facts.pointer_vars {
            if in_idiom.contains(var) {
                result.pointers.insert(var.clone());
            } else if present.contains(var.as_str()) {
                result.opaque.insert(var.clone());
            }
        }
        result
    }
}

/// Pick the classifier for one record under the configured policy
pub fn classifier_for(record: &LoopRecord, config: &AbstractionConfig) -> Box<dyn VariableClassifier> {
    match config.classifier {
        ClassifierChoice::Textual => Box::new(TextualClassifier::new(config)),
        ClassifierChoice::Facts => Box::new(FactClassifier::new(config)),
        ClassifierChoice::Auto if record.facts.is_some() => Box::new(FactClassifier::new(config)),
        ClassifierChoice::Auto => Box::new(TextualClassifier::new(config)),
    }
}

/// Identifiers occurring as `*v`, `v++`, `++v`, `v--`, `--v` or `v[...]`,
/// excluding keywords, control identifiers and callee/member names.
fn idiom_identifiers(masked: &str, control: &BTreeSet<String>) -> BTreeSet<String> {
    identifiers(masked)
        .filter(|id| !is_keyword(id.text) && !control.contains(id.text))
        .filter(|id| !is_call_or_member(masked, id.start, id.end))
        .filter(|id| in_idiom_position(masked, id))
        .map(|id| id.text.to_string())
        .collect()
}

fn in_idiom_position(masked: &str, id: &Ident<'_>) -> bool {
    let bytes = masked.as_bytes();

    if let Some(next) = next_non_ws(masked, id.end) {
        let rest = &bytes[next..];
        if rest.starts_with(b"++") || rest.starts_with(b"--") || rest[0] == b'[' {
            return true;
        }
    }

    if let Some(prev) = prev_non_ws(masked, id.start) {
        if bytes[prev] == b'*' && is_unary_position(masked, prev) {
            return true;
        }
        if prev >= 1 && matches!(&bytes[prev - 1..=prev], b"++" | b"--") {
            return true;
        }
    }
    false
}
