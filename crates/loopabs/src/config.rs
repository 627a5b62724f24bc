//! Pipeline configuration

use crate::error::PipelineError;
use loopabs_cbmc::CbmcConfig;
use loopabs_core::AbstractionConfig;
use loopabs_harness::HarnessConfig;
use loopabs_invariant::InvariantConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "LOOPABS_CONFIG";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "loopabs.json";

/// Configuration for a whole pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub abstraction: AbstractionConfig,
    pub harness: HarnessConfig,
    pub cbmc: CbmcConfig,
    pub invariant: InvariantConfig,

    /// JSON array of loop records from the extraction collaborator
    pub input: Option<PathBuf>,

    /// Root of the per-stage record store
    pub output_dir: PathBuf,

    /// Minimum number of verified loops for a successful run (default: 100)
    pub min_corpus_size: usize,

    /// Maximum concurrent CBMC processes (default: available parallelism)
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            abstraction: AbstractionConfig::default(),
            harness: HarnessConfig::default(),
            cbmc: CbmcConfig::default(),
            invariant: InvariantConfig::default(),
            input: None,
            output_dir: PathBuf::from("output"),
            min_corpus_size: 100,
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl PipelineConfig {
    /// Load from `$LOOPABS_CONFIG`, else `./loopabs.json`, else defaults
    pub fn load() -> Result<Self, PipelineError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_path(local);
        }
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| PipelineError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_cbmc(mut self, cbmc: CbmcConfig) -> Self {
        self.cbmc = cbmc;
        self
    }
}
