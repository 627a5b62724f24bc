//! One CBMC process per harness, under a hard timeout

use crate::config::CbmcConfig;
use crate::detection::resolve_binary;
use crate::error::CbmcError;
use crate::outcome::{classify_output, log_tail, VerificationOutcome, VerificationStatus};
use loopabs_harness::HarnessSource;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Raw output from a CBMC invocation
#[derive(Debug, Clone)]
pub struct CbmcOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if killed by a signal)
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CbmcOutput {
    /// Get combined stdout and stderr
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs CBMC on harnesses and classifies the result
#[derive(Debug, Clone)]
pub struct CbmcRunner {
    config: CbmcConfig,
    binary: Result<PathBuf, String>,
}

impl CbmcRunner {
    /// Create a runner, resolving the binary once up front
    pub fn new(config: CbmcConfig) -> Self {
        let binary = resolve_binary(&config).map_err(|e| e.to_string());
        if let Err(reason) = &binary {
            warn!("{reason}; every loop will be classified ERROR");
        }
        Self { config, binary }
    }

    pub fn config(&self) -> &CbmcConfig {
        &self.config
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref().ok()
    }

    /// Verify one harness. Never fails: every problem becomes an outcome.
    pub async fn verify(&self, harness: &HarnessSource) -> VerificationOutcome {
        let start = Instant::now();
        let limit = self.config.log_limit;
        let mut outcome = match self.run(harness).await {
            Ok(output) => {
                let combined = output.combined();
                let status = classify_output(output.exit_code, &combined, &self.config);
                VerificationOutcome::new(&harness.loop_id, status, log_tail(&combined, limit))
            }
            Err(CbmcError::Timeout(limit_hit)) => VerificationOutcome::new(
                &harness.loop_id,
                VerificationStatus::Timeout,
                format!("Timeout: CBMC killed after {limit_hit:?}"),
            ),
            Err(e) => VerificationOutcome::new(
                &harness.loop_id,
                VerificationStatus::Error,
                log_tail(&e.to_string(), limit),
            ),
        };
        outcome.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            id = %harness.loop_id,
            status = %outcome.status,
            duration_ms = outcome.duration_ms,
            "verification finished"
        );
        outcome
    }

    /// Write the harness to a temporary file and run CBMC on it.
    ///
    /// The child is killed on timeout, and `kill_on_drop` covers every other
    /// early exit. The harness file is removed when this returns.
    pub async fn run(&self, harness: &HarnessSource) -> Result<CbmcOutput, CbmcError> {
        let binary = self
            .binary
            .as_ref()
            .map_err(|reason| CbmcError::NotFound(reason.clone()))?;

        let mut file = tempfile::Builder::new()
            .prefix("loopabs_")
            .suffix(".c")
            .tempfile()
            .map_err(CbmcError::HarnessWrite)?;
        file.write_all(harness.text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(CbmcError::HarnessWrite)?;

        let mut cmd = Command::new(binary);
        cmd.args(self.config.args(&harness.entry_function, file.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running CBMC: {:?}", cmd);
        let start = Instant::now();

        let mut child = cmd.spawn().map_err(CbmcError::Spawn)?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let limit = self.config.timeout();

        let result = timeout(limit, async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();

            let (status, stdout_result, stderr_result) = tokio::join!(
                child.wait(),
                async {
                    if let Some(mut handle) = stdout_handle {
                        let _ = handle.read_to_end(&mut stdout).await;
                    }
                    stdout
                },
                async {
                    if let Some(mut handle) = stderr_handle {
                        let _ = handle.read_to_end(&mut stderr).await;
                    }
                    stderr
                }
            );

            Ok::<_, std::io::Error>((status?, stdout_result, stderr_result))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => Ok(CbmcOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code(),
                duration: start.elapsed(),
            }),
            Ok(Err(e)) => Err(CbmcError::Wait(e)),
            Err(_) => {
                warn!(id = %harness.loop_id, "CBMC timed out after {:?}", limit);
                let _ = child.kill().await;
                Err(CbmcError::Timeout(limit))
            }
        }
    }
}
