//! Idiom rewriter
//!
//! Rewrites pointer idioms into index form: pointer `p` becomes index `p_idx`
//! over backing array `arr_p`. Rules are applied per variable in a fixed
//! priority order (compound dereference, plain dereference, subscript, bare
//! increment/decrement) so that no simpler rule ever consumes part of a
//! compound idiom. Variables are processed longest name first.
//!
//! Matching happens on the masked text; replacements are spliced into the
//! unmasked text at the same offsets, so literals and comments survive
//! untouched.

use crate::error::CoreError;
use crate::lexer::{is_ident_byte, is_unary_position, mask, matching_close, next_non_ws};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Idiom family a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdiomKind {
    CompoundDerefInc,
    CompoundDerefDec,
    PlainDeref,
    Subscript,
    BareInc,
    BareDec,
}

/// Where the `++`/`--` sits relative to the variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fix {
    Post,
    Pre,
    None,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    kind: IdiomKind,
    fix: Fix,
}

/// Rules in application order. The order is load-bearing.
const RULES: [Rule; 10] = [
    Rule { kind: IdiomKind::CompoundDerefInc, fix: Fix::Post },
    Rule { kind: IdiomKind::CompoundDerefInc, fix: Fix::Pre },
    Rule { kind: IdiomKind::CompoundDerefDec, fix: Fix::Post },
    Rule { kind: IdiomKind::CompoundDerefDec, fix: Fix::Pre },
    Rule { kind: IdiomKind::PlainDeref, fix: Fix::None },
    Rule { kind: IdiomKind::Subscript, fix: Fix::None },
    Rule { kind: IdiomKind::BareInc, fix: Fix::Post },
    Rule { kind: IdiomKind::BareInc, fix: Fix::Pre },
    Rule { kind: IdiomKind::BareDec, fix: Fix::Post },
    Rule { kind: IdiomKind::BareDec, fix: Fix::Pre },
];

impl Rule {
    fn op(&self) -> &'static str {
        match self.kind {
            IdiomKind::CompoundDerefDec | IdiomKind::BareDec => "--",
            _ => "++",
        }
    }

    fn pattern(&self, var: &str) -> String {
        let v = regex::escape(var);
        let op = regex::escape(self.op());
        match (self.kind, self.fix) {
            (IdiomKind::CompoundDerefInc | IdiomKind::CompoundDerefDec, Fix::Post) => {
                format!(r"\*\s*\b{v}\b\s*{op}")
            }
            (IdiomKind::CompoundDerefInc | IdiomKind::CompoundDerefDec, _) => {
                format!(r"\*\s*{op}\s*\b{v}\b")
            }
            (IdiomKind::PlainDeref, _) => format!(r"\*\s*\b{v}\b"),
            (IdiomKind::Subscript, _) => format!(r"\b{v}\s*\["),
            (IdiomKind::BareInc | IdiomKind::BareDec, Fix::Post) => format!(r"\b{v}\b\s*{op}"),
            (IdiomKind::BareInc | IdiomKind::BareDec, _) => format!(r"{op}\s*\b{v}\b"),
        }
    }

    fn is_deref(&self) -> bool {
        matches!(
            self.kind,
            IdiomKind::CompoundDerefInc | IdiomKind::CompoundDerefDec | IdiomKind::PlainDeref
        )
    }

    /// Index-form text for a match that needs no bracket matching
    fn replacement(&self, var: &str) -> String {
        let op = self.op();
        match (self.kind, self.fix) {
            (IdiomKind::PlainDeref, _) => format!("arr_{var}[{var}_idx]"),
            (IdiomKind::CompoundDerefInc | IdiomKind::CompoundDerefDec, Fix::Post) => {
                format!("arr_{var}[{var}_idx{op}]")
            }
            (IdiomKind::CompoundDerefInc | IdiomKind::CompoundDerefDec, _) => {
                format!("arr_{var}[{op}{var}_idx]")
            }
            (_, Fix::Post) => format!("{var}_idx{op}"),
            _ => format!("{op}{var}_idx"),
        }
    }
}

/// One rule that fired while rewriting a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApplication {
    pub kind: IdiomKind,
    pub count: usize,
}

/// Pointer variables in rewrite order: longest first, then by name
pub fn rewrite_order(pointers: &BTreeSet<String>) -> Vec<&str> {
    let mut vars: Vec<&str> = pointers.iter().map(String::as_str).collect();
    vars.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    vars
}

/// Apply every rule for `var`, in priority order, to `text`.
pub fn rewrite_variable(text: &str, var: &str) -> Result<(String, Vec<RuleApplication>), CoreError> {
    validate_identifier(var)?;
    let mut current = text.to_string();
    let mut applied = Vec::new();

    for rule in RULES {
        let re = Regex::new(&rule.pattern(var))?;
        let mut total = 0;
        // Subscripts can nest (`p[p[0]]`), so repeat until nothing changes.
        loop {
            let (next, count) = apply_rule(&current, &re, &rule, var);
            current = next;
            total += count;
            if count == 0 || rule.kind != IdiomKind::Subscript {
                break;
            }
        }
        if total > 0 {
            debug!(var, kind = ?rule.kind, count = total, "applied rewrite rule");
            applied.push(RuleApplication { kind: rule.kind, count: total });
        }
    }
    Ok((current, applied))
}

fn apply_rule(text: &str, re: &Regex, rule: &Rule, var: &str) -> (String, usize) {
    let masked = mask(text);
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    let mut count = 0;

    for m in re.find_iter(&masked) {
        if m.start() < last {
            continue;
        }
        if rule.is_deref() && !is_unary_position(&masked, m.start()) {
            continue;
        }
        // `*p[i]` is `*(p[i])`; left alone so the subscript rule takes `p[i]`
        // and the remaining `*` fails completeness.
        if rule.kind == IdiomKind::PlainDeref
            && next_non_ws(&masked, m.end()).is_some_and(|i| masked.as_bytes()[i] == b'[')
        {
            continue;
        }
        let (end, replacement) = if rule.kind == IdiomKind::Subscript {
            let open = m.end() - 1;
            let Some(close) = matching_close(&masked, open) else {
                continue;
            };
            let index = text[open + 1..close].trim();
            (close + 1, format!("arr_{var}[{var}_idx + ({index})]"))
        } else {
            (m.end(), rule.replacement(var))
        };
        out.push_str(&text[last..m.start()]);
        out.push_str(&replacement);
        last = end;
        count += 1;
    }
    out.push_str(&text[last..]);
    (out, count)
}

fn validate_identifier(var: &str) -> Result<(), CoreError> {
    let valid = var
        .as_bytes()
        .first()
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
        && var.bytes().all(is_ident_byte);
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidIdentifier(var.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rw(text: &str, var: &str) -> String {
        rewrite_variable(text, var).unwrap().0
    }

    #[test]
    fn test_post_increment_deref() {
        assert_eq!(rw("c = *p++;", "p"), "c = arr_p[p_idx++];");
    }

    #[test]
    fn test_pre_increment_deref() {
        assert_eq!(rw("c = *++p;", "p"), "c = arr_p[++p_idx];");
    }

    #[test]
    fn test_post_and_pre_increment_are_distinct() {
        let post = rw("c = *p++;", "p");
        let pre = rw("c = *++p;", "p");
        assert_ne!(post, pre);
        assert!(post.contains("[p_idx++]"));
        assert!(pre.contains("[++p_idx]"));
    }

    #[test]
    fn test_decrement_deref() {
        assert_eq!(rw("c = *p--;", "p"), "c = arr_p[p_idx--];");
        assert_eq!(rw("c = *--p;", "p"), "c = arr_p[--p_idx];");
    }

    #[test]
    fn test_plain_deref() {
        assert_eq!(rw("while (*s) s++;", "s"), "while (arr_s[s_idx]) s_idx++;");
        assert_eq!(rw("(*p)++;", "p"), "(arr_p[p_idx])++;");
    }

    #[test]
    fn test_subscript() {
        assert_eq!(rw("x = p[i + 1];", "p"), "x = arr_p[p_idx + (i + 1)];");
        assert_eq!(
            rw("x = p[p[0]];", "p"),
            "x = arr_p[p_idx + (arr_p[p_idx + (0)])];"
        );
    }

    #[test]
    fn test_bare_increment_and_decrement() {
        assert_eq!(rw("p++; ++p;", "p"), "p_idx++; ++p_idx;");
        assert_eq!(rw("p--; --p;", "p"), "p_idx--; --p_idx;");
    }

    #[test]
    fn test_deref_after_statement_head() {
        assert_eq!(rw("if (c) *p = 0;", "p"), "if (c) arr_p[p_idx] = 0;");
        assert_eq!(
            rw("while (*s) *d++ = *s++;", "d"),
            "while (*s) arr_d[d_idx++] = *s++;"
        );
        assert_eq!(
            rw("for (; *s; s++) *d = 0;", "d"),
            "for (; *s; s++) arr_d[d_idx] = 0;"
        );
    }

    #[test]
    fn test_deref_of_subscript_left_to_subscript_rule() {
        assert_eq!(rw("*p[0] = 1;", "p"), "*arr_p[p_idx + (0)] = 1;");
    }

    #[test]
    fn test_binary_star_is_not_deref() {
        assert_eq!(rw("x = y * p;", "p"), "x = y * p;");
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(rw("*ptr = *p; ptr++;", "p"), "*ptr = arr_p[p_idx]; ptr++;");
        assert_eq!(rw("up++; p++;", "p"), "up++; p_idx++;");
    }

    #[test]
    fn test_literals_untouched() {
        assert_eq!(
            rw(r#"if (*p == '*') s = "*p++"; p++;"#, "p"),
            r#"if (arr_p[p_idx] == '*') s = "*p++"; p_idx++;"#
        );
    }

    #[test]
    fn test_rule_is_idempotent() {
        let once = rw("while (*p && p[1]) { *q = *p++; --p; }", "p");
        assert_eq!(rw(&once, "p"), once);
    }

    #[test]
    fn test_rewrite_order_longest_first() {
        let vars: BTreeSet<String> = ["p", "ptr", "q", "ab"].iter().map(|s| s.to_string()).collect();
        assert_eq!(rewrite_order(&vars), vec!["ptr", "ab", "p", "q"]);
    }

    #[test]
    fn test_invalid_identifier() {
        assert!(matches!(
            rewrite_variable("x", "a.b"),
            Err(CoreError::InvalidIdentifier(_))
        ));
        assert!(rewrite_variable("x", "").is_err());
    }

    #[test]
    fn test_applications_reported() {
        let (_, applied) = rewrite_variable("*p++; *p; p++;", "p").unwrap();
        let kinds: Vec<_> = applied.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![IdiomKind::CompoundDerefInc, IdiomKind::PlainDeref, IdiomKind::BareInc]
        );
    }
}
