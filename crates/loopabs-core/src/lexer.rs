//! Shallow C lexical helpers
//!
//! Loop fragments are treated as opaque text. These helpers give just enough
//! lexical structure to scan them safely: literals and comments are masked out
//! (with byte offsets preserved), identifiers can be enumerated with correct
//! word boundaries, and `*`/`&` can be told apart as unary or binary operators.

/// Every C keyword, plus `assert`, which loop fragments use as a statement.
pub const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex", "_Imaginary",
    "_Alignas", "_Alignof", "_Atomic", "_Static_assert", "_Noreturn", "_Thread_local",
    "__restrict", "__inline", "__typeof__", "typeof", "assert",
];

/// Keywords that name (part of) a type.
pub const TYPE_KEYWORDS: &[&str] = &[
    "char", "short", "int", "long", "unsigned", "signed", "float", "double", "void", "const",
    "volatile", "restrict", "__restrict", "_Bool", "struct", "union", "enum",
];

/// Keywords after which an operator is necessarily unary.
const PREFIX_KEYWORDS: &[&str] = &["return", "case", "sizeof", "else", "do"];

/// Keywords whose parenthesised head is followed by a statement.
const STATEMENT_HEAD_KEYWORDS: &[&str] = &["if", "while", "for", "switch"];

pub fn is_keyword(word: &str) -> bool {
    C_KEYWORDS.contains(&word)
}

pub fn is_type_keyword(word: &str) -> bool {
    TYPE_KEYWORDS.contains(&word)
}

/// Typedef-style names (`size_t`, `uint8_t`) are treated as types.
pub fn is_type_name(word: &str) -> bool {
    is_type_keyword(word) || (word.len() > 2 && word.ends_with("_t"))
}

#[inline]
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

/// Replace string/char literals with `0` bytes and comments with spaces.
///
/// The result has exactly the same byte length as the input, so offsets found
/// in the masked text index the unmasked text. Literals become operand-like
/// (`'a' * b` still reads as a multiplication) while comments vanish.
pub fn mask(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let end = (i + 1).min(bytes.len());
                out[start..end].fill(b'0');
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                let end = (i + 2).min(bytes.len());
                blank(&mut out[start..end]);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                blank(&mut out[start..i]);
            }
            _ => i += 1,
        }
    }
    // Only whole literal/comment spans were replaced, and those always start
    // and end on ASCII delimiters, so the buffer is still valid UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}

fn blank(span: &mut [u8]) {
    for b in span {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

/// An identifier token inside a (masked) fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// Iterator over identifier tokens. Numeric literals such as `0x1f` or
/// `10UL` are skipped whole, so their letters never surface as identifiers.
pub struct Identifiers<'a> {
    text: &'a str,
    pos: usize,
}

pub fn identifiers(text: &str) -> Identifiers<'_> {
    Identifiers { text, pos: 0 }
}

impl<'a> Iterator for Identifiers<'a> {
    type Item = Ident<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if is_ident_start(b) {
                let start = self.pos;
                while self.pos < bytes.len() && is_ident_byte(bytes[self.pos]) {
                    self.pos += 1;
                }
                return Some(Ident {
                    start,
                    end: self.pos,
                    text: &self.text[start..self.pos],
                });
            }
            if b.is_ascii_digit() {
                while self.pos < bytes.len() && is_ident_byte(bytes[self.pos]) {
                    self.pos += 1;
                }
                continue;
            }
            self.pos += 1;
        }
        None
    }
}

/// Index of the closest non-whitespace byte strictly before `at`.
pub fn prev_non_ws(text: &str, at: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..at.min(bytes.len()))
        .rev()
        .find(|&i| !bytes[i].is_ascii_whitespace())
}

/// Index of the closest non-whitespace byte at or after `at`.
pub fn next_non_ws(text: &str, at: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    (at..bytes.len()).find(|&i| !bytes[i].is_ascii_whitespace())
}

/// Given the index of an opening `[` or `(`, return the index of its match.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (o, c) = match bytes.get(open)? {
        b'[' => (b'[', b']'),
        b'(' => (b'(', b')'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == o {
            depth += 1;
        } else if b == c {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Given the index of a closing `)`, return the index of its `(`.
fn matching_open_paren(text: &str, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the parenthesised group closing at `close` is a cast like
/// `(unsigned char)` or `(const char *)`.
fn is_cast(text: &str, close: usize) -> bool {
    let Some(open) = matching_open_paren(text, close) else {
        return false;
    };
    let inner = &text[open + 1..close];
    let mut saw_type = false;
    for ident in identifiers(inner) {
        if !is_type_name(ident.text) {
            return false;
        }
        saw_type = true;
    }
    saw_type
        && inner
            .bytes()
            .all(|b| is_ident_byte(b) || b == b'*' || b.is_ascii_whitespace())
}

/// Whether the `)` at `close` ends an `if`/`while`/`for`/`switch` head.
fn closes_statement_head(text: &str, close: usize) -> bool {
    let Some(open) = matching_open_paren(text, close) else {
        return false;
    };
    let Some(end) = prev_non_ws(text, open) else {
        return false;
    };
    let bytes = text.as_bytes();
    if !is_ident_byte(bytes[end]) {
        return false;
    }
    let start = (0..=end)
        .rev()
        .take_while(|&i| is_ident_byte(bytes[i]))
        .last()
        .unwrap_or(end);
    STATEMENT_HEAD_KEYWORDS.contains(&&text[start..=end])
}

/// Whether the operator byte at `at` sits in unary (prefix) position.
///
/// An operator is binary when the preceding token is an operand: an
/// identifier, a number, a closing bracket, or a postfix `++`/`--`. A `)`
/// closing a cast or a statement head (`if (c) *p = 0;`) does not count as
/// an operand.
pub fn is_unary_position(text: &str, at: usize) -> bool {
    let bytes = text.as_bytes();
    let Some(prev) = prev_non_ws(text, at) else {
        return true;
    };
    let b = bytes[prev];
    if b == b')' {
        return closes_statement_head(text, prev) || is_cast(text, prev);
    }
    if b == b']' {
        return false;
    }
    if is_ident_byte(b) {
        let start = (0..=prev)
            .rev()
            .take_while(|&i| is_ident_byte(bytes[i]))
            .last()
            .unwrap_or(prev);
        return PREFIX_KEYWORDS.contains(&&text[start..=prev]);
    }
    if (b == b'+' || b == b'-') && prev >= 1 && bytes[prev - 1] == b {
        return match prev_non_ws(text, prev - 1) {
            Some(p) => !(is_ident_byte(bytes[p]) || bytes[p] == b')' || bytes[p] == b']'),
            None => true,
        };
    }
    true
}

/// Whether the identifier ending at `end` is the target of a plain `=`.
pub fn is_plain_assignment(text: &str, end: usize) -> bool {
    let bytes = text.as_bytes();
    match next_non_ws(text, end) {
        Some(i) => bytes[i] == b'=' && bytes.get(i + 1) != Some(&b'='),
        None => false,
    }
}

/// Whether the identifier spanning `start..end` is modified in place: a
/// compound assignment (`+=`, `<<=`, ...) or an adjacent `++`/`--`.
pub fn is_in_place_update(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    if let Some(i) = next_non_ws(text, end) {
        let rest = &bytes[i..];
        let compound = matches!(
            rest,
            [b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^', b'=', ..]
                | [b'<', b'<', b'=', ..]
                | [b'>', b'>', b'=', ..]
        );
        if compound || rest.starts_with(b"++") || rest.starts_with(b"--") {
            return true;
        }
    }
    if let Some(p) = prev_non_ws(text, start) {
        if p >= 1 && matches!(&bytes[p - 1..=p], b"++" | b"--") {
            return true;
        }
    }
    false
}

/// Whether the identifier spanning `start..end` is used as a callee or as a
/// struct/union member (`f(`, `.x`, `->x`).
pub fn is_call_or_member(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    if let Some(next) = next_non_ws(text, end) {
        if bytes[next] == b'(' {
            return true;
        }
    }
    if let Some(prev) = prev_non_ws(text, start) {
        if bytes[prev] == b'.' {
            return true;
        }
        if bytes[prev] == b'>' && prev >= 1 && bytes[prev - 1] == b'-' {
            return true;
        }
    }
    false
}
