//! Disqualification gate
//!
//! Runs before classification. A loop that calls a function, touches a struct
//! member, takes an address, jumps, nests another loop, declares a pointer, or
//! assigns to a special global cannot be modelled by a flat backing array and
//! is rejected here instead of being rewritten.

use crate::config::AbstractionConfig;
use crate::lexer::{
    identifiers, is_ident_byte, is_in_place_update, is_keyword, is_plain_assignment,
    is_type_name, is_unary_position, next_non_ws, prev_non_ws,
};
use crate::record::LoopRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a loop was not abstracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    /// Call on a non-control identifier
    FunctionCall(String),
    /// `.` or `->` member reference
    MemberAccess,
    /// Assignment to a reserved global such as `errno`
    SpecialAssignment(String),
    /// Unary `&`
    AddressOf,
    Goto,
    NestedLoop,
    /// Pointer declared inside the loop
    PointerDeclaration(String),
    /// Generated `p_idx`/`arr_p` name already used by the loop
    NameCollision(String),
    /// Pointer variables left un-rewritten after all rules ran
    IncompleteRewrite(Vec<String>),
    /// The rewriter itself failed on this loop
    RewriteFailed(String),
}

impl Rejection {
    /// Stable short name of the rejection reason
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::FunctionCall(_) => "function_call",
            Rejection::MemberAccess => "member_access",
            Rejection::SpecialAssignment(_) => "special_assignment",
            Rejection::AddressOf => "address_of",
            Rejection::Goto => "goto",
            Rejection::NestedLoop => "nested_loop",
            Rejection::PointerDeclaration(_) => "pointer_declaration",
            Rejection::NameCollision(_) => "name_collision",
            Rejection::IncompleteRewrite(_) => "incomplete_rewrite",
            Rejection::RewriteFailed(_) => "rewrite_failed",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::FunctionCall(name) => write!(f, "function call `{name}`"),
            Rejection::MemberAccess => write!(f, "member access"),
            Rejection::SpecialAssignment(name) => write!(f, "assignment to `{name}`"),
            Rejection::AddressOf => write!(f, "address-of operator"),
            Rejection::Goto => write!(f, "goto"),
            Rejection::NestedLoop => write!(f, "nested loop"),
            Rejection::PointerDeclaration(name) => write!(f, "pointer declaration `{name}`"),
            Rejection::NameCollision(name) => write!(f, "name collision on `{name}`"),
            Rejection::IncompleteRewrite(names) => {
                write!(f, "incomplete rewrite of {}", names.join(", "))
            }
            Rejection::RewriteFailed(error) => write!(f, "rewrite failed: {error}"),
        }
    }
}

/// Check a loop against the gate. `masked` is the lexically masked source.
///
/// Facts from the extractor are consulted first; the text is scanned
/// regardless, so a loop whose facts under-report is still caught.
pub fn check(record: &LoopRecord, masked: &str, config: &AbstractionConfig) -> Option<Rejection> {
    if let Some(facts) = &record.facts {
        if let Some(name) = facts
            .calls
            .iter()
            .find(|c| !config.control_identifiers.contains(*c))
        {
            return Some(Rejection::FunctionCall(name.clone()));
        }
        if facts.member_access {
            return Some(Rejection::MemberAccess);
        }
        if facts.address_of {
            return Some(Rejection::AddressOf);
        }
        if facts.has_goto {
            return Some(Rejection::Goto);
        }
        if facts.nested_loop {
            return Some(Rejection::NestedLoop);
        }
    }
    check_text(masked, config)
}

fn check_text(masked: &str, config: &AbstractionConfig) -> Option<Rejection> {
    let bytes = masked.as_bytes();
    let mut loops = 0usize;

    for ident in identifiers(masked) {
        let word = ident.text;
        match word {
            "goto" => return Some(Rejection::Goto),
            "for" | "while" => {
                loops += 1;
                if loops > 1 {
                    return Some(Rejection::NestedLoop);
                }
                continue;
            }
            _ => {}
        }

        if !is_keyword(word) && !config.control_identifiers.contains(word) {
            if let Some(next) = next_non_ws(masked, ident.end) {
                if bytes[next] == b'(' {
                    return Some(Rejection::FunctionCall(word.to_string()));
                }
            }
        }

        if config.reserved_identifiers.contains(word)
            && (is_plain_assignment(masked, ident.end)
                || is_in_place_update(masked, ident.start, ident.end))
        {
            return Some(Rejection::SpecialAssignment(word.to_string()));
        }

        if is_type_name(word) {
            if let Some(name) = declared_pointer(masked, ident.end) {
                return Some(Rejection::PointerDeclaration(name));
            }
        }
    }

    if has_member_access(masked) {
        return Some(Rejection::MemberAccess);
    }
    if has_address_of(masked) {
        return Some(Rejection::AddressOf);
    }
    None
}

/// After a type name, `* name` (any number of stars) declares a pointer.
fn declared_pointer(masked: &str, after_type: usize) -> Option<String> {
    let bytes = masked.as_bytes();
    let mut i = next_non_ws(masked, after_type)?;
    if bytes[i] != b'*' {
        return None;
    }
    while bytes.get(i).is_some_and(|&b| b == b'*' || b.is_ascii_whitespace()) {
        i += 1;
    }
    let start = i;
    while bytes.get(i).is_some_and(|&b| is_ident_byte(b)) {
        i += 1;
    }
    let name = &masked[start..i];
    if name.is_empty() || name.as_bytes()[0].is_ascii_digit() || is_type_name(name) {
        return None;
    }
    Some(name.to_string())
}

fn has_member_access(masked: &str) -> bool {
    let bytes = masked.as_bytes();
    if masked.contains("->") {
        return true;
    }
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'.' {
            continue;
        }
        let Some(prev) = prev_non_ws(masked, i) else {
            continue;
        };
        let Some(next) = next_non_ws(masked, i + 1) else {
            continue;
        };
        let operand_before = is_ident_byte(bytes[prev]) || bytes[prev] == b')' || bytes[prev] == b']';
        let field_after = bytes[next].is_ascii_alphabetic() || bytes[next] == b'_';
        if operand_before && field_after && !ends_with_number(masked, prev) {
            return true;
        }
    }
    false
}

/// Whether the token ending at `last` is a numeric literal (`1.e5`).
fn ends_with_number(masked: &str, last: usize) -> bool {
    let bytes = masked.as_bytes();
    let start = (0..=last)
        .rev()
        .take_while(|&i| is_ident_byte(bytes[i]))
        .last()
        .unwrap_or(last);
    bytes[start].is_ascii_digit()
}

fn has_address_of(masked: &str) -> bool {
    let bytes = masked.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'&'
            && bytes.get(i + 1) != Some(&b'&')
            && bytes.get(i + 1) != Some(&b'=')
            && (i == 0 || bytes[i - 1] != b'&')
            && is_unary_position(masked, i)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::mask;
    use crate::record::UsageFacts;

    fn gate(src: &str) -> Option<Rejection> {
        let record = LoopRecord::new("t", src);
        check(&record, &mask(src), &AbstractionConfig::default())
    }

    #[test]
    fn test_function_call_rejected() {
        assert_eq!(
            gate("while (strcmp(a, b)) { a++; }"),
            Some(Rejection::FunctionCall("strcmp".into()))
        );
    }

    #[test]
    fn test_control_identifiers_are_not_calls() {
        assert_eq!(gate("while (n) { assert(n > 0); n--; }"), None);
        assert_eq!(gate("for (; *s; s++) if (*s == 0) break;"), None);
        assert_eq!(gate("while (sizeof(x) > n) n++;"), None);
    }

    #[test]
    fn test_call_inside_string_ignored() {
        assert_eq!(gate(r#"while (*p != 'x') { q = "f(x)"; p++; }"#), None);
    }

    #[test]
    fn test_member_access_rejected() {
        assert_eq!(gate("while (n->next) n = n->next;"), Some(Rejection::MemberAccess));
        assert_eq!(gate("while (s.len) s.len--;"), Some(Rejection::MemberAccess));
        assert_eq!(gate("while (x < 1.5) x++;"), None);
        assert_eq!(gate("while (x < 1.e5) x++;"), None);
    }

    #[test]
    fn test_special_assignment_rejected() {
        assert_eq!(
            gate("while (*p) { errno = 0; p++; }"),
            Some(Rejection::SpecialAssignment("errno".into()))
        );
        assert_eq!(
            gate("while (n) { optind++; n--; }"),
            Some(Rejection::SpecialAssignment("optind".into()))
        );
        assert_eq!(gate("while (errno == 0) n++;"), None);
    }

    #[test]
    fn test_address_of_rejected() {
        assert_eq!(gate("while (n) { q = &x; n--; }"), Some(Rejection::AddressOf));
        assert_eq!(gate("while (a && b) { m &= 3; x = a & b; }"), None);
    }

    #[test]
    fn test_goto_and_nested_loop_rejected() {
        assert_eq!(gate("while (n) { if (n == 3) goto out; n--; }"), Some(Rejection::Goto));
        assert_eq!(
            gate("for (i = 0; i < n; i++) while (*p) p++;"),
            Some(Rejection::NestedLoop)
        );
        assert_eq!(gate("do { n--; } while (n);"), None);
    }

    #[test]
    fn test_pointer_declaration_rejected() {
        assert_eq!(
            gate("while (n--) { const char *t = s; s++; }"),
            Some(Rejection::PointerDeclaration("t".into()))
        );
        assert_eq!(gate("while (*s) { c = (unsigned char *)s; s++; }"), None);
        assert_eq!(gate("while (n) { x = n * size; n--; }"), None);
    }

    #[test]
    fn test_facts_take_precedence() {
        let facts = UsageFacts {
            calls: ["memcpy".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let record = LoopRecord::new("t", "while (*p) p++;").with_facts(facts);
        let masked = mask(&record.source_code);
        assert_eq!(
            check(&record, &masked, &AbstractionConfig::default()),
            Some(Rejection::FunctionCall("memcpy".into()))
        );
    }

    #[test]
    fn test_rejection_serialization() {
        let json = serde_json::to_value(Rejection::FunctionCall("strcmp".into())).unwrap();
        assert_eq!(json["reason"], "function_call");
        assert_eq!(json["detail"], "strcmp");
        let json = serde_json::to_value(Rejection::Goto).unwrap();
        assert_eq!(json["reason"], "goto");
    }

    #[test]
    fn test_kind_matches_serialized_reason() {
        for rejection in [
            Rejection::IncompleteRewrite(vec!["p".into()]),
            Rejection::RewriteFailed("bad pattern".into()),
            Rejection::Goto,
        ] {
            let json = serde_json::to_value(&rejection).unwrap();
            assert_eq!(json["reason"], rejection.kind());
        }
    }
}
