//! LLM integration
//!
//! Features:
//! - OpenAI-compatible chat-completion backend
//! - Streaming token generation over SSE
//! - Per-call temperature so classification and generation can share
//!   one backend
//! - Prompt templates with named placeholders

pub mod backend;
pub mod prompt;

pub use backend::{FinishReason, GenerationResult, LlmBackend, LlmConfig, OpenAiBackend};
pub use prompt::{Message, PromptTemplate, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for weeklog_core::Error {
    fn from(err: LlmError) -> Self {
        weeklog_core::Error::Llm(err.to_string())
    }
}
