//! In-memory stand-ins for the model provider and the speech engine.

use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::llm::{CompletionRequest, LanguageModel, LlmError};
use crate::{EngineError, RawAudio, RawAudioStream, ScriptDocument, SpeechEngine};

/// Answers every request with the same text, or the same HTTP status error.
pub(crate) struct CannedModel {
    response: Result<String, u16>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl CannedModel {
    pub fn answering(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(response.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            response: Err(status),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LanguageModel for CannedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(LlmError::Status {
                status: *status,
                body: "provider exploded".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Yields two `[1, 2]`-shaped buffers per call, each tagged with the 1-based
/// call number. Text containing "silence" yields nothing.
#[derive(Default)]
pub(crate) struct FakeEngine {
    /// Call number that fails.
    pub fail_on_call: Option<usize>,
    /// Fail after the first buffer instead of before synthesis starts.
    pub fail_mid_stream: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeEngine {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl SpeechEngine for FakeEngine {
    fn synthesize<'a>(&'a self, text: &str, voice: &str) -> Result<RawAudioStream<'a>, EngineError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((text.to_string(), voice.to_string()));
        let call = calls.len();

        if text.contains("silence") {
            return Ok(Box::new(std::iter::empty()));
        }
        if self.fail_on_call == Some(call) {
            if !self.fail_mid_stream {
                return Err(EngineError::Backend("engine exploded".into()));
            }
            return Ok(Box::new(
                vec![
                    Ok(RawAudio::mono(vec![call as f32; 2])),
                    Err(EngineError::Backend("engine exploded".into())),
                    Ok(RawAudio::mono(vec![-1.0; 2])),
                ]
                .into_iter(),
            ));
        }

        let tag = call as f32;
        Ok(Box::new((0..2).map(move |i| {
            Ok(RawAudio {
                samples: vec![tag, i as f32],
                shape: vec![1, 2],
            })
        })))
    }

    fn voices(&self) -> Vec<String> {
        vec!["af_heart".to_string(), "am_echo".to_string()]
    }
}

/// Host, Guest, Host across two segments.
pub(crate) fn three_paragraphs() -> ScriptDocument {
    ScriptDocument::validate(&json!({
        "title": "The Ocean",
        "script_segments": [
            { "paragraphs": [
                { "speaker": "Host", "text": "Welcome." },
                { "speaker": "Guest", "text": "Glad to be here." }
            ] },
            { "paragraphs": [ { "speaker": "Host", "text": "Goodbye." } ] }
        ]
    }))
    .unwrap()
}

/// `three_paragraphs()` as a fenced model answer.
pub(crate) fn fenced_script() -> String {
    format!(
        "```json\n{}\n```",
        serde_json::to_string(&three_paragraphs()).unwrap()
    )
}
