//! Loop records supplied by the extraction collaborator

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Syntactic kind of an extracted loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    For,
    While,
    #[serde(alias = "do")]
    DoWhile,
}

/// AST-level usage facts for one loop, as reported by the extractor.
///
/// When present these take precedence over textual pattern matching: they say
/// which identifiers are pointer- or array-typed and which unsafe constructs
/// the loop contains, independent of how the text happens to be spelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageFacts {
    /// Identifiers declared with pointer or array type
    pub pointer_vars: BTreeSet<String>,
    /// Names of functions called inside the loop
    pub calls: BTreeSet<String>,
    /// Loop contains a `.` or `->` member reference
    pub member_access: bool,
    /// Loop takes an address with unary `&`
    pub address_of: bool,
    /// Loop contains a `goto`
    pub has_goto: bool,
    /// Loop contains another loop
    pub nested_loop: bool,
}

/// One syntactic loop extracted from a C compilation unit.
///
/// Immutable once created; every later stage refers to it by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRecord {
    pub id: String,
    #[serde(alias = "original_code")]
    pub source_code: String,
    #[serde(default)]
    pub function: String,
    #[serde(default, alias = "file_path")]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LoopKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts: Option<UsageFacts>,
}

impl LoopRecord {
    /// Create a record with only an id and source text
    pub fn new(id: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_code: source_code.into(),
            function: String::new(),
            file: String::new(),
            line: 0,
            column: None,
            kind: None,
            project: None,
            facts: None,
        }
    }

    /// Attach AST usage facts
    pub fn with_facts(mut self, facts: UsageFacts) -> Self {
        self.facts = Some(facts);
        self
    }

    /// Attach source location
    pub fn at(mut self, file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.function = function.into();
        self.line = line;
        self
    }
}
