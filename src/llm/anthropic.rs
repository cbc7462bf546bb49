//! Anthropic Messages API client
//!
//! Requests and replies go through typed wire structs. Only `text` content
//! blocks are read back; any other block type is ignored.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Role, StopReason, Usage};

/// Messages endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Default model to use
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Wait suggested to callers when a 429 carries no `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(30),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }
}

impl AnthropicConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
    usage: Arc<Mutex<Usage>>,
}

impl AnthropicClient {
    /// Create a client reading ANTHROPIC_API_KEY from the environment
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        Self::from_env(ANTHROPIC_API_KEY_ENV, config)
    }

    /// Create a client reading the key from a custom environment variable
    pub fn from_env(env_var: &str, config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(env_var).map_err(|_| LlmError::MissingApiKey {
            env_var: env_var.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let messages = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect();

        MessagesRequest {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages,
            temperature: request.temperature,
        }
    }

    /// Decode a 2xx body into a completion
    fn parse_body(&self, body: &str) -> Result<CompletionResponse, LlmError> {
        let reply: MessagesResponse = serde_json::from_str(body)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse Messages reply: {}", e)))?;

        let stop_reason = match reply.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            Some("refusal") => StopReason::Safety,
            _ => StopReason::EndTurn,
        };

        let usage = Usage {
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
        };
        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        let content = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
        })
    }

    /// Map a non-success status, preferring the API's own error message
    fn map_api_error(status: u16, retry_after: Option<u64>, body: &str) -> LlmError {
        if status == 429 {
            return LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
            };
        }

        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        LlmError::ApiError { status, message }
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        log::debug!("Sending request to Anthropic model {}", body.model);

        let response = self
            .client
            .post(&self.config.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        if !status.is_success() {
            return Err(Self::map_api_error(status.as_u16(), retry_after, &text));
        }

        self.parse_body(&text)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// Keep the API key out of debug output
impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key".to_string(), AnthropicConfig::default()).unwrap()
    }

    fn wire(client: &AnthropicClient, request: &CompletionRequest) -> Value {
        serde_json::to_value(client.build_request(request)).unwrap()
    }

    #[test]
    fn test_config_with_model() {
        let config = AnthropicConfig::with_model("claude-3-5-haiku-20241022");
        assert_eq!(config.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_missing_env_var() {
        let result = AnthropicClient::from_env("MACROLOG_TEST_UNSET_ANTHROPIC_KEY", AnthropicConfig::default());
        match result {
            Err(LlmError::MissingApiKey { env_var }) => assert_eq!(env_var, "MACROLOG_TEST_UNSET_ANTHROPIC_KEY"),
            other => panic!("expected MissingApiKey, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_readiness_follows_key() {
        assert!(client().is_ready());
        assert_eq!(client().model(), DEFAULT_MODEL);

        let keyless = AnthropicClient::with_api_key(String::new(), AnthropicConfig::default()).unwrap();
        assert!(!keyless.is_ready());
    }

    #[test]
    fn test_request_body_defaults() {
        let client = client();
        let request = CompletionRequest::new("You are a nutritionist").with_user_message("2 eggs");

        let body = wire(&client, &request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "You are a nutritionist");
        assert_eq!(body["messages"][0], json!({ "role": "user", "content": "2 eggs" }));
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_request_body_overrides() {
        let client = client();
        let mut request = CompletionRequest::new("")
            .with_user_message("Hello")
            .with_max_tokens(512)
            .with_temperature(0.0);
        request.model = Some("claude-opus-4-1".to_string());

        let body = wire(&client, &request);

        assert_eq!(body["model"], "claude-opus-4-1");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_parse_body_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "{\"items\": []," },
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "\"totals\": {}}" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        });

        let response = client().parse_body(&body.to_string()).unwrap();

        assert_eq!(response.content, "{\"items\": [],\n\"totals\": {}}");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn test_parse_body_stop_reasons() {
        let client = client();
        for (reason, expected) in [
            ("max_tokens", StopReason::MaxTokens),
            ("stop_sequence", StopReason::StopSequence),
            ("refusal", StopReason::Safety),
            ("something_new", StopReason::EndTurn),
        ] {
            let body = json!({ "content": [], "stop_reason": reason }).to_string();
            assert_eq!(client.parse_body(&body).unwrap().stop_reason, expected);
        }
    }

    #[test]
    fn test_parse_body_without_content_is_invalid() {
        let result = client().parse_body(r#"{"type": "error"}"#);
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_usage_accumulates_across_replies() {
        let client = client();
        for (input, output) in [(100, 50), (200, 100)] {
            let body = json!({
                "content": [],
                "usage": { "input_tokens": input, "output_tokens": output }
            });
            client.parse_body(&body.to_string()).unwrap();
        }

        let total = client.total_usage();
        assert_eq!(total.input_tokens, 300);
        assert_eq!(total.output_tokens, 150);
    }

    #[test]
    fn test_rate_limit_uses_retry_after() {
        let err = AnthropicClient::map_api_error(429, Some(12), "");
        assert!(matches!(err, LlmError::RateLimited { retry_after } if retry_after == Duration::from_secs(12)));

        let err = AnthropicClient::map_api_error(429, None, "");
        assert!(
            matches!(err, LlmError::RateLimited { retry_after } if retry_after == Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))
        );
    }

    #[test]
    fn test_api_error_message_extracted() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        match AnthropicClient::map_api_error(529, None, body) {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected: {:?}", other),
        }

        match AnthropicClient::map_api_error(502, None, "<html>bad gateway</html>") {
            LlmError::ApiError { message, .. } => assert_eq!(message, "<html>bad gateway</html>"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug_str = format!("{:?}", client());
        assert!(debug_str.contains(DEFAULT_MODEL));
        assert!(!debug_str.contains("test-key"));
    }
}
