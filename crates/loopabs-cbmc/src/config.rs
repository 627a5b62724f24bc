//! Configuration for the CBMC runner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for invoking CBMC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbmcConfig {
    /// Path to the `cbmc` binary (looked up on PATH if None)
    pub cbmc_path: Option<PathBuf>,

    /// Loop unwinding bound (default: 20)
    pub unwind: u32,

    /// Wall-clock limit per invocation in milliseconds (default: 60s)
    pub timeout_ms: u64,

    /// Property checks to enable
    pub checks: Vec<String>,

    /// Extra arguments placed before all generated arguments
    pub extra_args: Vec<String>,

    /// Maximum characters of combined output kept in the outcome
    pub log_limit: usize,

    /// Marker printed when every assertion holds
    pub success_marker: String,

    /// Marker printed when an assertion is violated
    pub failure_marker: String,
}

impl Default for CbmcConfig {
    fn default() -> Self {
        Self {
            cbmc_path: None,
            unwind: 20,
            timeout_ms: 60_000,
            checks: vec![
                "--bounds-check".to_string(),
                "--pointer-check".to_string(),
                "--div-by-zero-check".to_string(),
            ],
            extra_args: Vec::new(),
            log_limit: 2000,
            success_marker: "VERIFICATION SUCCESSFUL".to_string(),
            failure_marker: "VERIFICATION FAILED".to_string(),
        }
    }
}

impl CbmcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the per-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Use a specific binary instead of searching PATH
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.cbmc_path = Some(path.into());
        self
    }

    /// Arguments for one run, excluding the binary itself
    pub fn args(&self, entry_function: &str, harness: &std::path::Path) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("--function".to_string());
        args.push(entry_function.to_string());
        args.push("--unwind".to_string());
        args.push(self.unwind.to_string());
        args.extend(self.checks.iter().cloned());
        args.push(harness.display().to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = CbmcConfig::default();
        assert_eq!(config.unwind, 20);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.log_limit, 2000);
        assert!(config.cbmc_path.is_none());
        assert_eq!(config.checks.len(), 3);
    }

    #[test]
    fn test_args_order() {
        let config = CbmcConfig {
            extra_args: vec!["--trace".to_string()],
            ..Default::default()
        };
        let args = config.args("loopabs_x", Path::new("/tmp/h.c"));
        assert_eq!(
            args,
            vec![
                "--trace",
                "--function",
                "loopabs_x",
                "--unwind",
                "20",
                "--bounds-check",
                "--pointer-check",
                "--div-by-zero-check",
                "/tmp/h.c",
            ]
        );
    }

    #[test]
    fn test_with_timeout() {
        let config = CbmcConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_ms, 250);
    }
}
