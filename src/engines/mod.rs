//! Speech synthesis engines.
//!
//! Every engine implements [`SpeechEngine`](crate::SpeechEngine).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `kokoro` - Kokoro TTS (ONNX format, espeak-ng required)

#[cfg(feature = "kokoro")]
pub mod kokoro;
