//! The batch pipeline: extract, abstract, verify, clean
//!
//! Each stage reads the previous stage's records from the keyed store and
//! writes its own, one complete file per loop id. Stopping between loops
//! leaves every written record intact.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::report::{AbstractionSummary, BatchReport, RunSummary};
use clap::ValueEnum;
use loopabs_cbmc::{detect_cbmc, CbmcDetection, CbmcRunner, VerificationOutcome, VerificationStatus};
use loopabs_core::{AbstractionResult, Abstractor, CoreError, LoopRecord, Rejection};
use loopabs_harness::HarnessSynthesizer;
use loopabs_invariant::{create_source, InvariantSource};
use loopabs_store::{clean, MergeReport, Stage, StageStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A pipeline stage that can be (re)run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Step {
    /// Load loop records from the extraction collaborator's output
    Extract,
    /// Gate, classify, rewrite and check every raw loop
    Abstract,
    /// Synthesize harnesses and run CBMC
    Verify,
    /// Merge verified loops into the dataset
    Clean,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Extract, Step::Abstract, Step::Verify, Step::Clean];
}

/// Record written to the verified stage for each loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRecord {
    pub id: String,
    /// Invariant asserted around the loop, absent when no harness was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariant: Option<String>,
    pub verified: bool,
    pub status: VerificationStatus,
    pub cbmc_log: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl VerifiedRecord {
    pub fn new(outcome: &VerificationOutcome, invariant: Option<String>) -> Self {
        Self {
            id: outcome.loop_id.clone(),
            invariant,
            verified: outcome.status == VerificationStatus::Verified,
            status: outcome.status,
            cbmc_log: outcome.log_excerpt.clone(),
            duration_ms: outcome.duration_ms,
        }
    }
}

/// Drives the stages over one output directory
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    store: StageStore,
}

impl Pipeline {
    /// Open the output store. This is the only step whose failure is fatal
    /// to a whole run.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let store = StageStore::open(&config.output_dir)?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Run the selected steps in pipeline order. An empty selection runs all.
    pub async fn run(&self, steps: &[Step]) -> Result<RunSummary, PipelineError> {
        let mut steps = if steps.is_empty() {
            Step::ALL.to_vec()
        } else {
            steps.to_vec()
        };
        steps.sort();
        steps.dedup();

        let mut summary = RunSummary::default();
        for step in steps {
            info!("stage {step:?}");
            match step {
                Step::Extract => summary.extracted = Some(self.extract()?),
                Step::Abstract => summary.abstraction = Some(self.abstract_loops()?),
                Step::Verify => summary.verification = Some(self.verify().await?),
                Step::Clean => summary.merge = Some(self.clean()?),
            }
        }
        Ok(summary)
    }

    /// Write every input loop record to the raw stage and index their ids
    pub fn extract(&self) -> Result<usize, PipelineError> {
        let path = self.config.input.as_deref().ok_or(PipelineError::NoInput)?;
        let records = read_records(path)?;

        self.store.clear_stage(Stage::Raw)?;
        for record in &records {
            self.store.write(Stage::Raw, &record.id, record)?;
        }
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        self.store.write_index(&ids)?;
        info!(count = records.len(), "extracted loops from {}", path.display());
        Ok(records.len())
    }

    /// Abstract every raw loop and write the results
    pub fn abstract_loops(&self) -> Result<AbstractionSummary, PipelineError> {
        let ids = self.store.ids()?;
        let records: BTreeMap<String, LoopRecord> = self.store.read_all(Stage::Raw, &ids);
        let abstractor = Abstractor::new(self.config.abstraction.clone());
        self.store.clear_stage(Stage::Abstracted)?;

        let mut summary = AbstractionSummary::default();
        for record in records.values() {
            let result = match abstractor.abstract_loop(record) {
                Ok(result) => result,
                Err(e) => {
                    warn!(id = %record.id, "abstraction failed: {e}");
                    summary.errors += 1;
                    rewrite_failure(record, &e)
                }
            };
            match &result.rejection {
                Some(rejection) => debug!(id = %record.id, %rejection, "loop rejected"),
                None => debug!(id = %record.id, pointers = result.pointer_index_map.len(), "loop abstracted"),
            }
            summary.record(&result);
            self.store.write(Stage::Abstracted, &record.id, &result)?;
        }
        info!(
            total = summary.total,
            abstracted = summary.abstracted,
            rejected = summary.rejected_total(),
            "abstraction finished"
        );
        Ok(summary)
    }

    /// Verify every abstracted loop, at most `max_concurrent` at a time
    pub async fn verify(&self) -> Result<BatchReport, PipelineError> {
        let ids = self.store.ids()?;
        let abstracted: BTreeMap<String, AbstractionResult> = self.store.read_all(Stage::Abstracted, &ids);
        let mut raw: BTreeMap<String, LoopRecord> = self.store.read_all(Stage::Raw, &ids);

        if let CbmcDetection::Available { path, version } = detect_cbmc(&self.config.cbmc).await {
            info!("using {} ({version})", path.display());
        }
        let source: Arc<dyn InvariantSource> = Arc::from(create_source(&self.config.invariant)?);
        let worker = Arc::new(VerifyWorker {
            synthesizer: HarnessSynthesizer::new(self.config.harness.clone()),
            runner: CbmcRunner::new(self.config.cbmc.clone()),
            source,
            store: self.store.clone(),
        });
        self.store.clear_stage(Stage::Verified)?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        for (id, result) in abstracted {
            let record = raw.remove(&id);
            let worker = Arc::clone(&worker);
            let permit = semaphore.clone().acquire_owned().await;
            tasks.spawn(async move {
                let _permit = permit;
                worker.verify_one(result, record).await
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined??;
            report.record(&outcome);
        }
        info!(
            total = report.total,
            verified = report.count(VerificationStatus::Verified),
            refuted = report.count(VerificationStatus::Refuted),
            skipped = report.count(VerificationStatus::Skipped),
            timeout = report.count(VerificationStatus::Timeout),
            error = report.count(VerificationStatus::Error),
            "verification finished"
        );
        Ok(report)
    }

    /// Merge the three stages into the dataset
    pub fn clean(&self) -> Result<MergeReport, PipelineError> {
        Ok(clean(&self.store, self.config.min_corpus_size)?)
    }
}

/// Shared, read-only state for per-loop verification tasks
struct VerifyWorker {
    synthesizer: HarnessSynthesizer,
    runner: CbmcRunner,
    source: Arc<dyn InvariantSource>,
    store: StageStore,
}

impl VerifyWorker {
    async fn verify_one(
        &self,
        result: AbstractionResult,
        record: Option<LoopRecord>,
    ) -> Result<VerificationOutcome, StoreError> {
        let id = result.loop_id.clone();
        let (outcome, invariant) = if result.is_abstracted() {
            let candidate = match self.source.propose(&result, record.as_ref()).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(%id, source = self.source.name(), "no candidate invariant: {e}");
                    None
                }
            };
            match self.synthesizer.synthesize(&result, candidate.as_deref()) {
                Ok(harness) => (self.runner.verify(&harness).await, Some(harness.invariant)),
                Err(e) => (
                    VerificationOutcome::new(&id, VerificationStatus::Error, e.to_string()),
                    None,
                ),
            }
        } else {
            let reason = result
                .rejection
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "empty or unsupported loop".to_string());
            (VerificationOutcome::skipped(&id, reason), None)
        };

        self.store
            .write(Stage::Verified, &id, &VerifiedRecord::new(&outcome, invariant))?;
        Ok(outcome)
    }
}

/// Rejected result standing in for a loop the rewriter failed on, so it still
/// reaches the verify stage as SKIPPED
fn rewrite_failure(record: &LoopRecord, error: &CoreError) -> AbstractionResult {
    AbstractionResult::rejected(&record.id, Rejection::RewriteFailed(error.to_string()))
}

fn read_records(path: &Path) -> Result<Vec<LoopRecord>, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<LoopRecord> = serde_json::from_str(&text).map_err(|source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut seen = HashSet::new();
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(PipelineError::DuplicateId(record.id.clone()));
        }
    }
    Ok(records)
}
