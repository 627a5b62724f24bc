//! Configuration for invariant sources

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which collaborator supplies candidate invariants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// No candidates; harnesses assert the bounds-only invariant
    #[default]
    BoundsOnly,
    /// Precomputed `id -> invariant` table on disk
    Table,
    /// OpenAI-compatible chat completion endpoint
    Llm,
}

/// Settings for an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Configuration for the candidate invariant collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InvariantConfig {
    pub source: SourceKind,
    /// Table file used when `source` is `table`
    pub table: Option<PathBuf>,
    pub llm: LlmConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InvariantConfig::default();
        assert_eq!(config.source, SourceKind::BoundsOnly);
        assert!(config.table.is_none());
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.llm.api_key_env, "DEEPSEEK_API_KEY");
    }

    #[test]
    fn test_completions_url() {
        let config = LlmConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_missing_key_env() {
        let config = LlmConfig {
            api_key_env: "LOOPABS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(config.api_key().is_none());
    }
}
