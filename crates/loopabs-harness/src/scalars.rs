//! Scalar variable discovery
//!
//! Every identifier in an abstracted body that is not a keyword, type name,
//! macro, or generated index/array name needs a declaration in the harness.
//! A scalar whose first use is the target of a plain assignment is loop-local
//! state and starts at zero; anything read first is a symbolic input.

use loopabs_core::lexer::{
    identifiers, is_call_or_member, is_keyword, is_plain_assignment, is_type_name, mask,
    next_non_ws,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarInit {
    /// Assigned before it is read
    Zero,
    /// Read before any assignment
    Symbolic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scalar {
    pub name: String,
    pub init: ScalarInit,
}

/// All-caps names are taken to be macros from the enclosing translation unit.
fn is_macro_name(word: &str) -> bool {
    word.bytes().any(|b| b.is_ascii_uppercase()) && !word.bytes().any(|b| b.is_ascii_lowercase())
}

/// Scalars referenced by `body`, sorted by name
pub fn discover_scalars(body: &str, pointers: &BTreeSet<String>) -> Vec<Scalar> {
    let generated: BTreeSet<String> = pointers
        .iter()
        .flat_map(|p| [p.clone(), format!("{p}_idx"), format!("arr_{p}")])
        .collect();
    let masked = mask(body);
    let mut found: BTreeMap<String, ScalarInit> = BTreeMap::new();

    for ident in identifiers(&masked) {
        let word = ident.text;
        if found.contains_key(word)
            || is_keyword(word)
            || is_type_name(word)
            || is_macro_name(word)
            || word.starts_with("__CPROVER")
            || generated.contains(word)
            || is_call_or_member(&masked, ident.start, ident.end)
        {
            continue;
        }
        let init = if is_plain_assignment(&masked, ident.end)
            && !assigned_from_itself(&masked, word, ident.end)
        {
            ScalarInit::Zero
        } else {
            ScalarInit::Symbolic
        };
        found.insert(word.to_string(), init);
    }

    found
        .into_iter()
        .map(|(name, init)| Scalar { name, init })
        .collect()
}

/// Whether the right-hand side of the assignment after `lhs_end` reads `name`
/// (as in `x = x + 1`).
fn assigned_from_itself(masked: &str, name: &str, lhs_end: usize) -> bool {
    let Some(eq) = next_non_ws(masked, lhs_end) else {
        return false;
    };
    let bytes = masked.as_bytes();
    let mut depth = 0i32;
    let mut end = masked.len();
    for (i, &b) in bytes.iter().enumerate().skip(eq + 1) {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' if depth == 0 => {
                end = i;
                break;
            }
            b')' | b']' => depth -= 1,
            b';' | b',' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    identifiers(&masked[eq + 1..end]).any(|id| id.text == name)
}
