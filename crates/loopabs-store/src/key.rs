//! Loop id to file name mapping

use sha2::{Digest, Sha256};

/// File name (without extension) for a loop id.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`. If anything had to change,
/// a short SHA-256 suffix of the unmodified id keeps distinct ids distinct.
pub fn file_key(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let unsafe_name = cleaned.is_empty() || cleaned.starts_with('.');
    if cleaned == id && !unsafe_name {
        return cleaned;
    }
    let digest = Sha256::digest(id.as_bytes());
    let suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{cleaned}-{suffix}")
}
