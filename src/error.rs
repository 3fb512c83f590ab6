use crate::llm::LlmError;
use crate::script::{GenerationError, SchemaViolation};

/// Failure raised by a [`SpeechEngine`](crate::SpeechEngine).
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Voice '{0}' is not available")]
    VoiceNotFound(String),
    #[error("Unexpected audio buffer shape {0:?}, expected mono samples")]
    Shape(Vec<usize>),
    #[error("{0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Every way a podcast request can fail.
///
/// Whatever the variant, the caller sees it exactly once, as the terminal
/// event of the request.
#[derive(thiserror::Error, Debug)]
pub enum PodcastError {
    /// The model client or speech engine failed to initialize at startup.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Missing or empty input, rejected before any external call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The model call itself failed.
    #[error("Language model request failed: {0}")]
    ModelProvider(#[source] LlmError),
    /// The model answered, but not with a JSON document.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
    #[error("Script rejected: {0}")]
    SchemaViolation(#[source] SchemaViolation),
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailure(#[from] EngineError),
    #[error("no audio generated")]
    EmptyResult,
}

impl From<GenerationError> for PodcastError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Provider(e) => Self::ModelProvider(e),
            GenerationError::EmptyResponse => {
                Self::MalformedResponse("model returned no content".to_string())
            }
            GenerationError::MalformedResponse(e) => Self::MalformedResponse(e.to_string()),
            GenerationError::SchemaViolation(e) => Self::SchemaViolation(e),
        }
    }
}
