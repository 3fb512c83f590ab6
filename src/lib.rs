//! # podcast-tts
//!
//! A Rust library that turns arbitrary source text into a two-speaker
//! ("Host"/"Guest") podcast, streamed paragraph by paragraph.
//!
//! ## Features
//!
//! - **Script writing**: one language-model call produces a JSON script that is
//!   validated into a strictly-typed [`ScriptDocument`]
//! - **Streaming synthesis**: every paragraph is rendered by a [`SpeechEngine`]
//!   and delivered as soon as each audio chunk exists
//! - **Kokoro TTS**: the bundled engine, enabled with the `kokoro` feature
//! - **SSE transport**: an axum router that ships chunks as base64 WAV events
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! podcast-tts = { version = "2026.2", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use podcast_tts::config::ModelConfigBuilder;
//! use podcast_tts::engines::kokoro::{KokoroEngine, KokoroModelParams};
//! use podcast_tts::llm::openai::OpenAiCompatible;
//! use podcast_tts::{PipelineEvent, PodcastPipeline, VoiceMap};
//!
//! let config = ModelConfigBuilder::default().api_key("...").build()?;
//! let model = Arc::new(OpenAiCompatible::new(&config)?);
//! let engine = Arc::new(KokoroEngine::load(Path::new("models/kokoro"), KokoroModelParams::default())?);
//!
//! let pipeline = PodcastPipeline::new(model, engine, config.decoding);
//! for event in pipeline.run("The ocean covers most of Earth.", VoiceMap::new("af_heart", "am_echo"))? {
//!     if let PipelineEvent::Completed(podcast) = event {
//!         podcast.write_wav(Path::new("podcast.wav"))?;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod script;
pub mod server;
pub mod voices;

#[cfg(test)]
mod fakes;

pub use error::{EngineError, PodcastError};
pub use pipeline::{
    collect_waveform, PipelineEvent, PodcastPipeline, PodcastStream, SynthesisStream, Synthesizer,
};
pub use script::{Paragraph, ScriptDocument, ScriptGenerator, Segment};
pub use voices::{Speaker, VoiceMap};

use std::io::Cursor;
use std::path::Path;

/// Sample rate of every chunk flowing through the pipeline.
pub const SAMPLE_RATE: u32 = 24000;

/// A bounded piece of synthesized mono audio.
///
/// Chunks are emitted in generation order; concatenating them in that order
/// yields the full podcast waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro)
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }

    /// Encode the chunk as a self-contained 16-bit PCM WAV file in memory.
    ///
    /// Samples outside `[-1.0, 1.0]` are clamped.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
            for &sample in &self.samples {
                // Full-scale 32768; `as` saturates 1.0 to i16::MAX.
                let scaled = (sample.clamp(-1.0, 1.0) * 32768.0) as i16;
                writer.write_sample(scaled)?;
            }
            writer.finalize()?;
        }
        Ok(buffer.into_inner())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One buffer exactly as an engine produced it.
///
/// `shape` holds the engine's output dimensions (e.g. `[1, n]` for a batched
/// ONNX waveform). An empty shape means a flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub shape: Vec<usize>,
}

impl RawAudio {
    pub fn mono(samples: Vec<f32>) -> Self {
        let shape = vec![samples.len()];
        Self { samples, shape }
    }

    /// Collapse singleton dimensions into a flat chunk at `sample_rate`.
    ///
    /// Fails when more than one dimension is larger than one, or when the
    /// shape does not describe the sample count.
    pub fn into_chunk(self, sample_rate: u32) -> Result<AudioChunk, EngineError> {
        if !self.shape.is_empty() {
            let declared: usize = self.shape.iter().product();
            let wide_axes = self.shape.iter().filter(|&&dim| dim > 1).count();
            if declared != self.samples.len() || wide_axes > 1 {
                return Err(EngineError::Shape(self.shape));
            }
        }
        Ok(AudioChunk {
            samples: self.samples,
            sample_rate,
        })
    }
}

/// Lazy, finite, non-restartable sequence of buffers for one paragraph.
pub type RawAudioStream<'a> = Box<dyn Iterator<Item = Result<RawAudio, EngineError>> + 'a>;

/// Common interface for text-to-speech synthesis engines.
///
/// An engine is a long-lived, process-wide handle shared by every request, so
/// all methods take `&self`. Each call to [`SpeechEngine::synthesize`] opens a
/// fresh synthesis session for a single paragraph.
pub trait SpeechEngine: Send + Sync {
    /// Start synthesizing `text` with `voice`, yielding buffers as they are produced.
    fn synthesize<'a>(&'a self, text: &str, voice: &str) -> Result<RawAudioStream<'a>, EngineError>;

    /// Output sample rate of every buffer.
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Voice identifiers this engine knows about. Empty when it cannot tell.
    fn voices(&self) -> Vec<String> {
        Vec::new()
    }

    /// Synthesize `text` and concatenate every buffer into one chunk.
    ///
    /// Default implementation drains `synthesize()`.
    fn synthesize_all(&self, text: &str, voice: &str) -> Result<AudioChunk, EngineError> {
        let sample_rate = self.sample_rate();
        let mut samples = Vec::new();
        for raw in self.synthesize(text, voice)? {
            samples.extend(raw?.into_chunk(sample_rate)?.samples);
        }
        Ok(AudioChunk {
            samples,
            sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_wav_has_riff_header_and_clamps() {
        let chunk = AudioChunk::new(vec![0.0, 2.0, -2.0]);
        let bytes = chunk.to_wav_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 3 * 2);

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![0, i16::MAX, i16::MIN]);
    }

    #[test]
    fn pcm16_scales_by_full_range() {
        let bytes = AudioChunk::new(vec![0.5, -0.5, 0.25]).to_wav_bytes().unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![16384, -16384, 8192]);
    }

    #[test]
    fn collapses_singleton_batch_dimension() {
        let raw = RawAudio {
            samples: vec![0.1, 0.2, 0.3],
            shape: vec![1, 3],
        };
        let chunk = raw.into_chunk(SAMPLE_RATE).unwrap();
        assert_eq!(chunk.samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn rejects_multichannel_buffers() {
        let raw = RawAudio {
            samples: vec![0.0; 4],
            shape: vec![2, 2],
        };
        assert!(matches!(
            raw.into_chunk(SAMPLE_RATE),
            Err(EngineError::Shape(shape)) if shape == vec![2, 2]
        ));
    }

    #[test]
    fn duration_follows_sample_rate() {
        let chunk = AudioChunk::new(vec![0.0; 12000]);
        assert!((chunk.duration_secs() - 0.5).abs() < f64::EPSILON);
    }
}
