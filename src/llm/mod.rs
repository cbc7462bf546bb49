//! LLM Client Layer - outbound calls to the language-model service
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - AnthropicClient and GeminiClient implementations
//! - MockLlmClient for tests and offline runs

pub mod anthropic;
pub mod client;
pub mod gemini;
pub mod mock;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError};
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockLlmClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
