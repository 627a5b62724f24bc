//! Completeness check for rewritten loop bodies

use crate::lexer::{identifiers, is_ident_byte, is_unary_position, mask, next_non_ws};
use std::collections::BTreeSet;

/// Names from `guarded` whose pointer use survived the rewrite in `text`.
///
/// A name is residual when it still occurs as a whole identifier token, or
/// when a unary `*` is applied to its index form (`*arr_p[...]`, `*p_idx`,
/// `*++p_idx`). `p_idx` and `arr_p` are distinct tokens, so on their own they
/// never count as an occurrence of `p`. Literals and comments are ignored.
pub fn residual<'a, I>(text: &str, guarded: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let guarded: BTreeSet<&str> = guarded.into_iter().map(String::as_str).collect();
    if guarded.is_empty() {
        return Vec::new();
    }
    let masked = mask(text);
    let mut found: BTreeSet<&str> = identifiers(&masked)
        .map(|id| id.text)
        .filter(|t| guarded.contains(t))
        .collect();
    found.extend(dereferenced_index_forms(&masked, &guarded));
    found.into_iter().map(String::from).collect()
}

/// Guarded names whose `arr_<p>` or `<p>_idx` is the operand of a unary `*`.
fn dereferenced_index_forms<'g>(masked: &str, guarded: &BTreeSet<&'g str>) -> Vec<&'g str> {
    let bytes = masked.as_bytes();
    let mut hits = Vec::new();
    for (at, _) in masked.match_indices('*') {
        if !is_unary_position(masked, at) {
            continue;
        }
        let Some(mut start) = next_non_ws(masked, at + 1) else {
            continue;
        };
        if matches!(bytes.get(start..start + 2), Some(b"++" | b"--")) {
            match next_non_ws(masked, start + 2) {
                Some(i) => start = i,
                None => continue,
            }
        }
        let end = (start..bytes.len())
            .find(|&i| !is_ident_byte(bytes[i]))
            .unwrap_or(bytes.len());
        let operand = &masked[start..end];
        let owner = operand
            .strip_prefix("arr_")
            .or_else(|| operand.strip_suffix("_idx"));
        if let Some(name) = owner.and_then(|o| guarded.get(o)) {
            hits.push(*name);
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fully_rewritten_is_clean() {
        let guarded = names(&["h", "n"]);
        let body = "while (arr_h[h_idx] && arr_h[h_idx] == arr_n[n_idx]) { h_idx++; n_idx++; }";
        assert!(residual(body, &guarded).is_empty());
    }

    #[test]
    fn test_pointer_comparison_is_residual() {
        let guarded = names(&["p", "q"]);
        assert_eq!(residual("while (p != q) p_idx++;", &guarded), names(&["p", "q"]));
    }

    #[test]
    fn test_occurrence_in_literal_ignored() {
        let guarded = names(&["p"]);
        assert!(residual(r#"s = "p"; /* p */ p_idx++;"#, &guarded).is_empty());
    }

    #[test]
    fn test_dereferenced_index_form_is_residual() {
        let guarded = names(&["p", "d"]);
        assert_eq!(residual("while (*arr_p[p_idx]) p_idx++;", &guarded), names(&["p"]));
        assert_eq!(residual("x = *arr_p[p_idx + (0)];", &guarded), names(&["p"]));
        assert_eq!(residual("if (c) *d_idx++ = 0;", &guarded), names(&["d"]));
        assert_eq!(residual("x = *++d_idx;", &guarded), names(&["d"]));
    }

    #[test]
    fn test_multiplication_by_index_form_is_clean() {
        let guarded = names(&["p", "q"]);
        let body = "x = arr_p[p_idx] * arr_q[q_idx]; y = n * p_idx; z = (m) *arr_q[0];";
        assert!(residual(body, &guarded).is_empty());
    }

    #[test]
    fn test_prefix_names_do_not_match() {
        let guarded = names(&["p"]);
        assert!(residual("ptr = up + p_idx + arr_p[0];", &guarded).is_empty());
    }
}
