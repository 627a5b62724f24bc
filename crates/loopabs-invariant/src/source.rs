//! The candidate invariant collaborator interface

use crate::config::{InvariantConfig, SourceKind};
use crate::error::InvariantError;
use crate::llm::LlmInvariantSource;
use async_trait::async_trait;
use loopabs_core::{AbstractionResult, LoopRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Supplies untrusted candidate invariants for abstracted loops.
///
/// `Ok(None)` means no candidate; callers fall back to the bounds-only
/// invariant. Errors are per-loop and never stop a batch.
#[async_trait]
pub trait InvariantSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn propose(
        &self,
        result: &AbstractionResult,
        record: Option<&LoopRecord>,
    ) -> Result<Option<String>, InvariantError>;
}

/// Never proposes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsOnly;

#[async_trait]
impl InvariantSource for BoundsOnly {
    fn name(&self) -> &str {
        "bounds-only"
    }

    async fn propose(
        &self,
        _result: &AbstractionResult,
        _record: Option<&LoopRecord>,
    ) -> Result<Option<String>, InvariantError> {
        Ok(None)
    }
}

/// Precomputed invariants keyed by loop id
#[derive(Debug, Clone, Default)]
pub struct InvariantTable {
    entries: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Map(HashMap<String, String>),
    List(Vec<TableEntry>),
}

#[derive(Deserialize)]
struct TableEntry {
    id: String,
    #[serde(default)]
    inv: String,
}

impl InvariantTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load a table from JSON: either `{"id": "inv", ...}` or
    /// `[{"id": ..., "inv": ...}, ...]`. Empty invariants are dropped.
    pub fn from_path(path: &Path) -> Result<Self, InvariantError> {
        let text = std::fs::read_to_string(path)?;
        let file: TableFile = serde_json::from_str(&text)
            .map_err(|e| InvariantError::ParseError(format!("{}: {e}", path.display())))?;
        let entries = match file {
            TableFile::Map(map) => map,
            TableFile::List(list) => list.into_iter().map(|e| (e.id, e.inv)).collect(),
        };
        Ok(Self::new(
            entries
                .into_iter()
                .filter(|(_, inv)| !inv.trim().is_empty())
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl InvariantSource for InvariantTable {
    fn name(&self) -> &str {
        "table"
    }

    async fn propose(
        &self,
        result: &AbstractionResult,
        _record: Option<&LoopRecord>,
    ) -> Result<Option<String>, InvariantError> {
        Ok(self.entries.get(&result.loop_id).cloned())
    }
}

/// Build the configured invariant source
pub fn create_source(config: &InvariantConfig) -> Result<Box<dyn InvariantSource>, InvariantError> {
    match config.source {
        SourceKind::BoundsOnly => Ok(Box::new(BoundsOnly)),
        SourceKind::Table => {
            let path = config.table.as_deref().ok_or_else(|| {
                InvariantError::ConfigError("table source needs a `table` path".to_string())
            })?;
            Ok(Box::new(InvariantTable::from_path(path)?))
        }
        SourceKind::Llm => Ok(Box::new(LlmInvariantSource::new(config.llm.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn result(id: &str) -> AbstractionResult {
        AbstractionResult {
            loop_id: id.to_string(),
            pointer_index_map: BTreeMap::new(),
            abstracted_body: Some("while (n) n = n - 1;".to_string()),
            rejection: None,
        }
    }

    #[tokio::test]
    async fn test_bounds_only_proposes_nothing() {
        assert_eq!(BoundsOnly.propose(&result("a"), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_table_from_list_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inv.json");
        std::fs::write(
            &path,
            r#"[{"id": "a", "inv": "n >= 0"}, {"id": "b", "inv": ""}, {"id": "c"}]"#,
        )
        .unwrap();
        let table = InvariantTable::from_path(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.propose(&result("a"), None).await.unwrap().as_deref(),
            Some("n >= 0")
        );
        assert_eq!(table.propose(&result("b"), None).await.unwrap(), None);
    }

    #[test]
    fn test_table_from_map_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inv.json");
        std::fs::write(&path, r#"{"a": "1", "b": "n > 0"}"#).unwrap();
        assert_eq!(InvariantTable::from_path(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_table_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inv.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            InvariantTable::from_path(&path),
            Err(InvariantError::ParseError(_))
        ));
    }

    #[test]
    fn test_create_source_variants() {
        let config = InvariantConfig::default();
        assert_eq!(create_source(&config).unwrap().name(), "bounds-only");

        let config = InvariantConfig {
            source: SourceKind::Table,
            ..Default::default()
        };
        assert!(matches!(
            create_source(&config),
            Err(InvariantError::ConfigError(_))
        ));

        let config = InvariantConfig {
            source: SourceKind::Llm,
            llm: LlmConfig {
                api_key_env: "LOOPABS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            create_source(&config),
            Err(InvariantError::NotConfigured(_))
        ));
    }
}
