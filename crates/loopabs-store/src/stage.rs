//! Per-stage JSON record store
//!
//! One JSON file per loop id per stage directory. Every write goes to a
//! temporary file in the same directory and is renamed into place, so a
//! reader (or an interrupted batch) only ever sees complete records.
//!
//! Stages are joined through `index.json`, the id list written by the
//! extract stage. Records are only ever looked up by id; whatever else sits
//! in a stage directory is never read.

use crate::error::StoreError;
use crate::key::file_key;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Pipeline stage directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Abstracted,
    Verified,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Raw, Stage::Abstracted, Stage::Verified];

    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Abstracted => "abstracted",
            Stage::Verified => "verified",
        }
    }
}

/// Name of the merged dataset file under the store root
pub const DATASET_FILE: &str = "dataset.json";

/// Name of the loop id index under the store root
pub const INDEX_FILE: &str = "index.json";

/// Keyed record store rooted at an output directory
#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    /// Open (creating if needed) the store and all stage directories.
    ///
    /// Failure here is the one condition that stops a batch.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for stage in Stage::ALL {
            let dir = root.join(stage.dir_name());
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::RootUnavailable {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn record_path(&self, stage: Stage, id: &str) -> PathBuf {
        self.stage_dir(stage).join(format!("{}.json", file_key(id)))
    }

    /// Atomically write the record for `id` in `stage`
    pub fn write<T: Serialize>(&self, stage: Stage, id: &str, record: &T) -> Result<PathBuf, StoreError> {
        let path = self.record_path(stage, id);
        write_json_atomic(&path, record)?;
        debug!(stage = stage.dir_name(), id, "wrote record");
        Ok(path)
    }

    /// Read the record for `id` in `stage`, if present
    pub fn read<T: DeserializeOwned>(&self, stage: Stage, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.record_path(stage, id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::json(&path, e))
    }

    /// Record the ids of the current batch, in input order
    pub fn write_index(&self, ids: &[String]) -> Result<PathBuf, StoreError> {
        let path = self.root.join(INDEX_FILE);
        write_json_atomic(&path, ids)?;
        Ok(path)
    }

    /// Ids of the current batch; empty before the first extract
    pub fn ids(&self) -> Result<Vec<String>, StoreError> {
        let path = self.root.join(INDEX_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::json(&path, e))
    }

    /// The `stage` records of `ids`, keyed by id.
    ///
    /// Missing ids are left out. Unreadable records are logged and left out.
    pub fn read_all<T: DeserializeOwned>(&self, stage: Stage, ids: &[String]) -> BTreeMap<String, T> {
        let mut out = BTreeMap::new();
        for id in ids {
            match self.read(stage, id) {
                Ok(Some(record)) => {
                    out.insert(id.clone(), record);
                }
                Ok(None) => debug!(stage = stage.dir_name(), %id, "no record"),
                Err(e) => warn!(stage = stage.dir_name(), %id, "skipping record: {e}"),
            }
        }
        out
    }

    /// Remove every record of a stage before it is re-run
    pub fn clear_stage(&self, stage: Stage) -> Result<usize, StoreError> {
        let dir = self.stage_dir(stage);
        let entries = std::fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                std::fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Atomically write the merged dataset
    pub fn write_dataset(&self, items: &[Value]) -> Result<PathBuf, StoreError> {
        let path = self.root.join(DATASET_FILE);
        write_json_atomic(&path, &items)?;
        Ok(path)
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| StoreError::json(path, e))?;
    tmp.write_all(b"\n")
        .and_then(|_| tmp.flush())
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: String,
        n: u32,
    }

    #[test]
    fn test_open_creates_stage_dirs() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path().join("out")).unwrap();
        for stage in Stage::ALL {
            assert!(store.stage_dir(stage).is_dir());
        }
    }

    #[test]
    fn test_open_unreachable_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            StageStore::open(&file),
            Err(StoreError::RootUnavailable { .. })
        ));
    }

    #[test]
    fn test_write_read_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path()).unwrap();
        store.write(Stage::Raw, "a/b", &Rec { id: "a/b".into(), n: 1 }).unwrap();
        store.write(Stage::Raw, "a/b", &Rec { id: "a/b".into(), n: 2 }).unwrap();
        let rec: Option<Rec> = store.read(Stage::Raw, "a/b").unwrap();
        assert_eq!(rec, Some(Rec { id: "a/b".into(), n: 2 }));
        let missing: Option<Rec> = store.read(Stage::Raw, "zzz").unwrap();
        assert!(missing.is_none());
        // no temp files left behind
        assert_eq!(std::fs::read_dir(store.stage_dir(Stage::Raw)).unwrap().count(), 1);
    }

    #[test]
    fn test_index_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path()).unwrap();
        assert!(store.ids().unwrap().is_empty());
        let ids = vec!["b".to_string(), "a/1".to_string()];
        store.write_index(&ids).unwrap();
        assert_eq!(store.ids().unwrap(), ids);
    }

    #[test]
    fn test_read_all_only_listed_ids() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path()).unwrap();
        store.write(Stage::Raw, "a", &Rec { id: "a".into(), n: 1 }).unwrap();
        store.write(Stage::Raw, "b", &json!({"id": "b", "n": "not a number"})).unwrap();
        store.write(Stage::Raw, "other", &Rec { id: "other".into(), n: 3 }).unwrap();
        std::fs::write(store.stage_dir(Stage::Raw).join("junk.json"), "{oops").unwrap();

        let ids: Vec<String> = ["a", "b", "missing"].iter().map(|s| s.to_string()).collect();
        let recs: BTreeMap<String, Rec> = store.read_all(Stage::Raw, &ids);
        assert_eq!(recs.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(recs["a"].n, 1);
    }

    #[test]
    fn test_clear_stage() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path()).unwrap();
        store.write(Stage::Abstracted, "a", &json!({"id": "a"})).unwrap();
        store.write(Stage::Abstracted, "b", &json!({"id": "b"})).unwrap();
        assert_eq!(store.clear_stage(Stage::Abstracted).unwrap(), 2);
        assert_eq!(std::fs::read_dir(store.stage_dir(Stage::Abstracted)).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_writes_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let store = StageStore::open(dir.path()).unwrap();
        let ids: Vec<String> = (0..16).map(|i| format!("loop-{i}")).collect();
        std::thread::scope(|s| {
            for i in 0..16 {
                let store = &store;
                s.spawn(move || {
                    let id = format!("loop-{i}");
                    let record = json!({"id": id.clone(), "i": i});
                    store.write(Stage::Verified, &id, &record).unwrap();
                });
            }
        });
        let records: BTreeMap<String, serde_json::Value> = store.read_all(Stage::Verified, &ids);
        assert_eq!(records.len(), 16);
    }
}
