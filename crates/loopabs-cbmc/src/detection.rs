//! CBMC installation detection

use crate::config::CbmcConfig;
use crate::error::CbmcError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Result of probing for CBMC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CbmcDetection {
    Available { path: PathBuf, version: String },
    NotFound(String),
}

/// Resolve the binary path from config, falling back to PATH lookup
pub fn resolve_binary(config: &CbmcConfig) -> Result<PathBuf, CbmcError> {
    match &config.cbmc_path {
        Some(path) if path.exists() => Ok(path.clone()),
        Some(path) => Err(CbmcError::NotFound(format!(
            "Configured cbmc path does not exist: {}",
            path.display()
        ))),
        None => which::which("cbmc")
            .map_err(|_| CbmcError::NotFound("cbmc not found on PATH".to_string())),
    }
}

/// Detect whether CBMC is available and report its version
pub async fn detect_cbmc(config: &CbmcConfig) -> CbmcDetection {
    let path = match resolve_binary(config) {
        Ok(path) => path,
        Err(e) => return CbmcDetection::NotFound(e.to_string()),
    };

    let mut cmd = Command::new(&path);
    cmd.arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = tokio::time::timeout(Duration::from_secs(10), cmd.output()).await;
    match result {
        Ok(Ok(output)) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!("Detected cbmc version: {}", version);
            CbmcDetection::Available { path, version }
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            CbmcDetection::NotFound(format!("cbmc --version failed: {}", stderr.trim()))
        }
        Ok(Err(e)) => CbmcDetection::NotFound(format!("Failed to execute cbmc: {}", e)),
        Err(_) => CbmcDetection::NotFound("cbmc --version timed out".to_string()),
    }
}
