//! Google Gemini API client implementation
//!
//! Implements the LlmClient trait against the `generateContent` endpoint.
//! Replies are requested as `application/json` so the model skips prose
//! and code fences where it can.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Role, StopReason, Usage};

/// Base URL for the Gemini API
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default model to use
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default max output tokens
const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    candidate_count: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(30),
            base_url: GEMINI_API_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Google Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    config: GeminiConfig,
    usage: Arc<Mutex<Usage>>,
}

impl GeminiClient {
    /// Create a client reading GEMINI_API_KEY from the environment
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        Self::from_env(GEMINI_API_KEY_ENV, config)
    }

    /// Create a client reading the key from a custom environment variable
    pub fn from_env(env_var: &str, config: GeminiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(env_var).map_err(|_| LlmError::MissingApiKey {
            env_var: env_var.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: GeminiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn build_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, model)
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        let system_instruction = (!request.system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(request.system.clone()),
            }],
        });

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
                temperature: request.temperature,
                candidate_count: 1,
                response_mime_type: "application/json",
            },
        }
    }

    fn parse_response(&self, response: GeminiResponse) -> Result<CompletionResponse, LlmError> {
        if let Some(error) = response.error {
            return Err(LlmError::InvalidResponse(format!("Gemini error: {}", error.message)));
        }

        let candidate = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::InvalidResponse("No candidates in Gemini response".to_string()))?;

        let content = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
                StopReason::Safety
            }
            _ => StopReason::EndTurn,
        };

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|m| Usage {
                input_tokens: m.prompt_token_count.unwrap_or(0),
                output_tokens: m.candidates_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
        })
    }

    /// Map a non-success status to an error, preferring Gemini's own message
    fn map_api_error(status: u16, body: &str) -> LlmError {
        let message = serde_json::from_str::<GeminiResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.to_string(), |e| e.message);

        match status {
            429 => LlmError::RateLimited {
                retry_after: parse_retry_hint(&message).unwrap_or(Duration::from_secs(60)),
            },
            _ => LlmError::ApiError { status, message },
        }
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }
}

/// Pull the delay out of messages like "Please retry in 6.406453963s."
fn parse_retry_hint(message: &str) -> Option<Duration> {
    let start = message.find("Please retry in ")? + "Please retry in ".len();
    let rest = &message[start..];
    let end = rest.find('s')?;
    let seconds = rest[..end].parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds.ceil()))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let url = self.build_url(model);
        let body = self.build_request(&request);

        log::debug!("Sending request to Gemini model {}", model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        if !status.is_success() {
            log::warn!("Gemini API returned {}", status);
            return Err(Self::map_api_error(status.as_u16(), &text));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        self.parse_response(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
