//! Language-model clients.
//!
//! The script generator only needs one blocking request/response exchange, so
//! the boundary is a single [`LanguageModel::complete`] call.
//!
//! # Available Clients
//!
//! - [`openai::OpenAiCompatible`] - any OpenAI-compatible chat completions
//!   endpoint (Gemini's compatibility layer by default)

pub mod openai;

use serde::{Deserialize, Serialize};

/// Decoding parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for DecodingParams {
    /// Deterministic decoding with room for a long script.
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 8000,
        }
    }
}

/// A single system + user exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub params: DecodingParams,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response contained no choices")]
    NoChoices,
    #[error("Missing API key for {0}")]
    MissingApiKey(String),
}

/// Plain-text completion from a generative language model.
///
/// Implementations are shared across requests, so they must tolerate
/// concurrent calls. Exactly one outbound request per call; no retries.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
