//! OpenAI-compatible LLM invariant proposer
//!
//! Sends the abstracted loop and its pointer map to a chat completion
//! endpoint in JSON-object response mode and reads the `inv` field of the
//! reply. The reply is untrusted text; the harness synthesizer sanitises it.

use crate::config::LlmConfig;
use crate::error::InvariantError;
use crate::source::InvariantSource;
use async_trait::async_trait;
use loopabs_core::{AbstractionResult, LoopRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "\
You are an expert in formal verification of C code using CBMC.
You are given a loop in which every pointer `p` has been replaced by an index
`p_idx` into a backing array `arr_p`. Propose a loop invariant for it.

Rules:
1. The invariant must be a single side-effect-free C expression over the
   loop's variables, `*_idx` indices and `arr_*` arrays. No quantifiers, no
   function calls, no assignments, no comments.
2. Prefer invariants that relate the loop's outputs to the array contents.
   For simple array writes, bounds on the indices are acceptable.
3. Output ONLY a JSON object with one key, \"inv\", whose value is the
   invariant as a string. No explanations, no markdown.

Example input loop:
  for (i = 0; arr_rel[rel_idx + (i)]; i++) if (arr_rel[rel_idx + (i)] == R_TLS) base = arr_rel[rel_idx + (i + 1)];
Example output:
  {\"inv\": \"(base == 0) || (i >= 1 && arr_rel[rel_idx + (i - 1)] == R_TLS)\"}
";

/// Chat completion client for OpenAI-compatible APIs (DeepSeek by default)
pub struct LlmInvariantSource {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl LlmInvariantSource {
    /// Create a client; fails if the API key variable is unset
    pub fn new(config: LlmConfig) -> Result<Self, InvariantError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| InvariantError::NotConfigured(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(config: LlmConfig, api_key: impl Into<String>) -> Result<Self, InvariantError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InvariantError::ConfigError(e.to_string()))?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, InvariantError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            stream: false,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 401 {
                return Err(InvariantError::AuthError(body));
            }
            if status.as_u16() == 429 {
                return Err(InvariantError::RateLimited);
            }
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return match error.error.code.as_deref() {
                    Some("invalid_api_key") => Err(InvariantError::AuthError(error.error.message)),
                    Some("rate_limit_exceeded") => Err(InvariantError::RateLimited),
                    _ => Err(InvariantError::RequestFailed(error.error.message)),
                };
            }
            return Err(InvariantError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| InvariantError::ParseError(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl InvariantSource for LlmInvariantSource {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn propose(
        &self,
        result: &AbstractionResult,
        record: Option<&LoopRecord>,
    ) -> Result<Option<String>, InvariantError> {
        let Some(body) = result.abstracted_body.as_deref() else {
            return Ok(None);
        };
        let content = self.complete(build_prompt(result, body, record)).await?;
        debug!(id = %result.loop_id, reply = %content, "llm reply");
        parse_candidate(&content)
    }
}

/// User prompt for one loop
pub fn build_prompt(result: &AbstractionResult, body: &str, record: Option<&LoopRecord>) -> String {
    let mapping = serde_json::to_string(&result.pointer_index_map).unwrap_or_default();
    let mut prompt = format!(
        "Abstracted loop:\n```\n{body}\n```\n\nPointer mapping (pointer -> index): {mapping}\n"
    );
    if let Some(record) = record {
        prompt.push_str(&format!(
            "Origin: function `{}` in {} line {}\n",
            record.function, record.file, record.line
        ));
    }
    prompt.push_str("\nReturn the JSON object with the invariant.");
    prompt
}

/// Extract the `inv` field from a model reply.
///
/// Tolerates a markdown code fence around the JSON. An empty or missing
/// `inv` is `Ok(None)`; a reply that is not JSON is a parse error.
pub fn parse_candidate(content: &str) -> Result<Option<String>, InvariantError> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    if json.is_empty() {
        return Ok(None);
    }
    let reply: InvariantReply =
        serde_json::from_str(json).map_err(|e| InvariantError::ParseError(e.to_string()))?;
    Ok(reply.inv.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[derive(Deserialize)]
struct InvariantReply {
    #[serde(default)]
    inv: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<String>,
}
