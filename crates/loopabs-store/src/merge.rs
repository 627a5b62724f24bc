//! Join stage records into the final dataset

use crate::error::StoreError;
use crate::stage::{Stage, StageStore};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Fields that only matter between stages
const INTERMEDIATE_FIELDS: &[&str] = &["ptr_vars"];

/// Summary of a clean/merge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Loops written to the dataset
    pub kept: usize,
    /// Loops present in every stage but not verified
    pub skipped: usize,
    /// Raw loops missing an abstracted or verified record
    pub incomplete: usize,
    pub min_corpus_size: usize,
    pub dataset_path: PathBuf,
}

impl MergeReport {
    pub fn threshold_met(&self) -> bool {
        self.kept >= self.min_corpus_size
    }
}

/// Merge keyed stage records for `ids`, in that order. Returns the kept
/// items, the number skipped as unverified, and the number missing a stage.
pub fn merge_records(
    ids: &[String],
    raw: &BTreeMap<String, Value>,
    abstracted: &BTreeMap<String, Value>,
    verified: &BTreeMap<String, Value>,
) -> (Vec<Value>, usize, usize) {
    let mut kept = Vec::new();
    let mut skipped = 0;
    let mut incomplete = 0;

    for id in ids {
        let (Some(raw_record), Some(abs_record), Some(ver_record)) =
            (raw.get(id), abstracted.get(id), verified.get(id))
        else {
            incomplete += 1;
            continue;
        };

        let mut item = Map::new();
        for record in [raw_record, abs_record, ver_record] {
            if let Value::Object(fields) = record {
                for (k, v) in fields {
                    item.insert(k.clone(), v.clone());
                }
            }
        }

        if item.get("verified") != Some(&Value::Bool(true)) {
            skipped += 1;
            continue;
        }
        let log_skipped = item
            .get("cbmc_log")
            .and_then(Value::as_str)
            .is_some_and(|log| log.starts_with("Skipped"));
        if log_skipped {
            skipped += 1;
            continue;
        }

        for field in INTERMEDIATE_FIELDS {
            item.remove(*field);
        }
        kept.push(Value::Object(item));
    }
    (kept, skipped, incomplete)
}

/// Look up every indexed loop in all three stages, merge, and write
/// `dataset.json`
pub fn clean(store: &StageStore, min_corpus_size: usize) -> Result<MergeReport, StoreError> {
    let ids = store.ids()?;
    let raw = stage_values(store, Stage::Raw, &ids);
    let abstracted = stage_values(store, Stage::Abstracted, &ids);
    let verified = stage_values(store, Stage::Verified, &ids);

    let (items, skipped, incomplete) = merge_records(&ids, &raw, &abstracted, &verified);
    let dataset_path = store.write_dataset(&items)?;

    let report = MergeReport {
        kept: items.len(),
        skipped,
        incomplete,
        min_corpus_size,
        dataset_path,
    };
    info!(
        kept = report.kept,
        skipped = report.skipped,
        incomplete = report.incomplete,
        "wrote {}",
        report.dataset_path.display()
    );
    if !report.threshold_met() {
        warn!(
            "only {} verified loops (< {})",
            report.kept, report.min_corpus_size
        );
    }
    Ok(report)
}

/// A stage's records for `ids`, minus any whose `id` field names another loop
fn stage_values(store: &StageStore, stage: Stage, ids: &[String]) -> BTreeMap<String, Value> {
    let mut values: BTreeMap<String, Value> = store.read_all(stage, ids);
    values.retain(|id, value| {
        let matches = value.get("id").and_then(Value::as_str) == Some(id.as_str());
        if !matches {
            warn!(stage = stage.dir_name(), %id, "record id does not match its key");
        }
        matches
    });
    values
}
