//! Candidate invariant handling
//!
//! Candidate text comes from an untrusted source. It is only ever placed
//! inside `assert(...)`, and it must read as a single side-effect-free C
//! expression over names the harness declares.

use crate::error::HarnessError;
use loopabs_core::lexer::{identifiers, is_keyword};
use std::collections::BTreeSet;

/// Bounds-only fallback: every index variable is non-negative
pub fn default_invariant<'a>(pointers: impl IntoIterator<Item = &'a str>) -> String {
    let terms: Vec<String> = pointers.into_iter().map(|p| format!("{p}_idx >= 0")).collect();
    if terms.is_empty() {
        "1".to_string()
    } else {
        terms.join(" && ")
    }
}

/// Validate a candidate invariant and return it trimmed.
///
/// `known` lists every identifier the harness declares; any other
/// identifier (other than an all-caps macro or keyword) is rejected.
pub fn sanitize_invariant(
    candidate: &str,
    known: &BTreeSet<String>,
    max_len: usize,
) -> Result<String, HarnessError> {
    let text = candidate.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();
    let invalid = |reason: &str| Err(HarnessError::InvalidInvariant(reason.to_string()));

    if text.is_empty() {
        return invalid("empty");
    }
    if text.len() > max_len {
        return invalid("too long");
    }
    if text.contains("//") || text.contains("/*") {
        return invalid("contains a comment");
    }
    if let Some(c) = text
        .chars()
        .find(|c| matches!(c, ';' | '{' | '}' | '#' | '"' | '\'' | '\\' | '\n' | '\r'))
    {
        return Err(HarnessError::InvalidInvariant(format!(
            "forbidden character {c:?}"
        )));
    }
    if text.contains("__CPROVER") {
        return invalid("refers to verifier builtins");
    }
    if text.contains("++") || text.contains("--") || has_assignment(text) {
        return invalid("has side effects");
    }
    if !balanced(text) {
        return invalid("unbalanced brackets or top-level comma");
    }
    for ident in identifiers(text) {
        let word = ident.text;
        let is_macro = !word.bytes().any(|b| b.is_ascii_lowercase());
        if !is_keyword(word) && !is_macro && !known.contains(word) {
            return Err(HarnessError::InvalidInvariant(format!(
                "unknown identifier `{word}`"
            )));
        }
    }
    Ok(text.to_string())
}

/// A `=` that is not part of `==`, `!=`, `<=` or `>=`.
fn has_assignment(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'=' {
            return false;
        }
        let prev = i.checked_sub(1).map(|j| bytes[j]);
        let next = bytes.get(i + 1).copied();
        let comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) || next == Some(b'=');
        // `<<=` and `>>=` are assignments even though they end in `<=`/`>=`
        let shift = i >= 2 && matches!(&bytes[i - 2..i], b"<<" | b">>");
        !comparison || shift
    })
}

/// Brackets balance and no comma sits at depth zero (it would split the
/// argument list of `assert`).
fn balanced(text: &str) -> bool {
    let mut stack = Vec::new();
    for b in text.bytes() {
        match b {
            b'(' | b'[' => stack.push(b),
            b')' => {
                if stack.pop() != Some(b'(') {
                    return false;
                }
            }
            b']' => {
                if stack.pop() != Some(b'[') {
                    return false;
                }
            }
            b',' if stack.is_empty() => return false,
            _ => {}
        }
    }
    stack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BTreeSet<String> {
        ["h_idx", "arr_h", "n"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_invariant() {
        assert_eq!(default_invariant(["h", "n"]), "h_idx >= 0 && n_idx >= 0");
        assert_eq!(default_invariant(std::iter::empty()), "1");
    }

    #[test]
    fn test_accepts_expression() {
        assert_eq!(
            sanitize_invariant("  h_idx >= 0 && h_idx <= n; ", &known(), 1000),
            Ok("h_idx >= 0 && h_idx <= n".to_string())
        );
        assert!(sanitize_invariant("arr_h[h_idx] != 0 || h_idx < INT_MAX", &known(), 1000).is_ok());
        assert!(sanitize_invariant("h_idx == 0", &known(), 1000).is_ok());
    }

    #[test]
    fn test_rejects_statements_and_side_effects() {
        for bad in [
            "h_idx >= 0); abort(",
            "1 } int x = 0; {",
            "h_idx++ >= 0",
            "(n = 0)",
            "n <<= 1",
            "h_idx >= 0 /* ok */",
            "#define X 1",
            "__CPROVER_assume(0)",
            "h_idx, n",
            "((h_idx)",
            "\"str\" == 0",
            "",
        ] {
            assert!(sanitize_invariant(bad, &known(), 1000).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_rejects_unknown_identifier() {
        assert_eq!(
            sanitize_invariant("h >= 0", &known(), 1000),
            Err(HarnessError::InvalidInvariant("unknown identifier `h`".to_string()))
        );
    }

    #[test]
    fn test_rejects_overlong() {
        let long = "h_idx >= 0 && ".repeat(100) + "1";
        assert!(sanitize_invariant(&long, &known(), 1000).is_err());
    }
}
