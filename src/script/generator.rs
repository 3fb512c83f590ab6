use std::sync::Arc;

use serde_json::Value;

use super::prompts;
use super::schema::{ScriptDocument, SchemaViolation};
use crate::llm::{CompletionRequest, DecodingParams, LanguageModel, LlmError};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("Model provider call failed: {0}")]
    Provider(#[from] LlmError),
    #[error("Model returned an empty response")]
    EmptyResponse,
    #[error("Model response is not valid JSON: {0}")]
    MalformedResponse(#[source] serde_json::Error),
    #[error("Script failed validation: {0}")]
    SchemaViolation(#[from] SchemaViolation),
}

/// Writes podcast scripts with a single language-model call per request.
///
/// Holds no per-request state; one generator is shared by every request.
#[derive(Clone)]
pub struct ScriptGenerator {
    model: Arc<dyn LanguageModel>,
    params: DecodingParams,
}

impl ScriptGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, params: DecodingParams) -> Self {
        Self { model, params }
    }

    /// Generate and validate a script for `source_text`.
    ///
    /// Parse and validation failures are returned immediately; nothing is retried.
    pub fn generate(&self, source_text: &str) -> Result<ScriptDocument, GenerationError> {
        let prompts = prompts::render(source_text);
        let request = CompletionRequest {
            system: prompts.system,
            user: prompts.user,
            params: self.params,
        };

        log::info!("Generating podcast script with {}", self.model.name());
        let raw = self.model.complete(&request)?;
        if raw.trim().is_empty() {
            log::error!("Model did not return any content");
            return Err(GenerationError::EmptyResponse);
        }

        let parsed: Value = serde_json::from_str(strip_code_fence(&raw)).map_err(|e| {
            log::error!("Failed to parse JSON from model response: {e}");
            log::debug!("Received malformed response: {raw}");
            GenerationError::MalformedResponse(e)
        })?;

        let document = ScriptDocument::validate(&parsed).inspect_err(|e| {
            log::error!("Generated script rejected: {e}");
        })?;
        log::info!(
            "Script '{}' ready: {} segments, {} paragraphs",
            document.title(),
            document.segments().len(),
            document.paragraph_count()
        );
        Ok(document)
    }

    /// Generate a script and flatten it into a plain transcript.
    pub fn generate_transcript(&self, source_text: &str) -> Result<String, GenerationError> {
        self.generate(source_text).map(|doc| doc.transcript())
    }
}

/// Remove a leading ```` ```json ```` fence and its closing fence.
///
/// Responses that do not start with the fence are returned trimmed but
/// otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix(JSON_FENCE) {
        Some(inner) => inner.strip_suffix(FENCE).unwrap_or(inner).trim(),
        None => trimmed,
    }
}
