//! Verification outcomes and output classification

use crate::config::CbmcConfig;
use serde::{Deserialize, Serialize};

/// Result taxonomy for one loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// CBMC reported success within the unwinding bound
    Verified,
    /// CBMC reported a violated assertion
    Refuted,
    /// No harness was produced for the loop
    Skipped,
    /// CBMC exceeded the wall-clock limit and was killed
    Timeout,
    /// CBMC could not run, crashed, or printed no verdict
    Error,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 5] = [
        VerificationStatus::Verified,
        VerificationStatus::Refuted,
        VerificationStatus::Skipped,
        VerificationStatus::Timeout,
        VerificationStatus::Error,
    ];

    /// CBMC produced a verdict about the program
    pub fn is_conclusive(self) -> bool {
        matches!(self, VerificationStatus::Verified | VerificationStatus::Refuted)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::Refuted => "REFUTED",
            VerificationStatus::Skipped => "SKIPPED",
            VerificationStatus::Timeout => "TIMEOUT",
            VerificationStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Terminal verification record for one loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    #[serde(rename = "id")]
    pub loop_id: String,
    pub status: VerificationStatus,
    /// Tail of the combined output, bounded by `log_limit`
    pub log_excerpt: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl VerificationOutcome {
    pub fn new(loop_id: impl Into<String>, status: VerificationStatus, log_excerpt: impl Into<String>) -> Self {
        Self {
            loop_id: loop_id.into(),
            status,
            log_excerpt: log_excerpt.into(),
            duration_ms: 0,
        }
    }

    /// Outcome for a loop that never got a harness
    pub fn skipped(loop_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::new(loop_id, VerificationStatus::Skipped, format!("Skipped: {reason}"))
    }
}

/// Classify CBMC's combined output and exit code.
///
/// A success marker only counts with exit status 0; a zero exit without a
/// marker is an anomaly, not a success.
pub fn classify_output(exit_code: Option<i32>, combined: &str, config: &CbmcConfig) -> VerificationStatus {
    if combined.contains(&config.failure_marker) {
        VerificationStatus::Refuted
    } else if combined.contains(&config.success_marker) && exit_code == Some(0) {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Error
    }
}

/// Keep at most `limit` characters from the end of `log`.
pub fn log_tail(log: &str, limit: usize) -> String {
    let count = log.chars().count();
    if count <= limit {
        return log.to_string();
    }
    log.chars().skip(count - limit).collect()
}
