use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::model::{find_onnx_file, phoneme_windows, KokoroError, KokoroModel, MAX_PHONEME_LEN};
use super::phonemizer::{voice_language, EspeakConfig, Phonemizer};
use super::vocab::Vocab;
use super::voices::VoiceStore;
use crate::error::EngineError;
use crate::{RawAudio, RawAudioStream, SpeechEngine};

const VOICES_FILE: &str = "voices-v1.0.bin";

/// Parameters for loading a Kokoro model directory.
#[derive(Debug, Clone)]
pub struct KokoroModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Where to keep the Level3-optimized ONNX graph between runs.
    ///
    /// Must be writable. Without it every start re-optimizes the graph.
    pub optimized_model_cache_path: Option<PathBuf>,
    pub espeak: EspeakConfig,
    /// Speech speed multiplier, 1.0 is normal.
    pub speed: f32,
}

impl Default for KokoroModelParams {
    fn default() -> Self {
        Self {
            num_threads: None,
            optimized_model_cache_path: None,
            espeak: EspeakConfig::default(),
            speed: 1.0,
        }
    }
}

/// Kokoro-82M behind the [`SpeechEngine`] interface.
///
/// Loaded once and shared by every request. Inference runs one window at a
/// time across the whole process; phonemization runs outside the lock.
///
/// ```rust,no_run
/// use podcast_tts::engines::kokoro::{KokoroEngine, KokoroModelParams};
/// use podcast_tts::SpeechEngine;
/// use std::path::Path;
///
/// let engine = KokoroEngine::load(Path::new("models/kokoro"), KokoroModelParams::default())?;
/// let audio = engine.synthesize_all("Hello, world!", "af_heart")?;
/// println!("Generated {} samples at {}Hz", audio.samples.len(), audio.sample_rate);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct KokoroEngine {
    model: Mutex<KokoroModel>,
    voices: VoiceStore,
    vocab: Vocab,
    phonemizer: Phonemizer,
    speed: f32,
}

impl KokoroEngine {
    /// Load the ONNX graph, the voice archive and the vocabulary from `model_dir`.
    pub fn load(model_dir: &Path, params: KokoroModelParams) -> Result<Self, KokoroError> {
        let voices_path = model_dir.join(VOICES_FILE);
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "Voice file not found at {}. Download it from the Kokoro model repository.",
                    voices_path.display()
                ),
            )));
        }

        let model = KokoroModel::load(
            &find_onnx_file(model_dir)?,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;
        Ok(Self {
            model: Mutex::new(model),
            voices: VoiceStore::load(&voices_path)?,
            vocab: Vocab::load(model_dir)?,
            phonemizer: Phonemizer::new(params.espeak),
            speed: params.speed,
        })
    }

    fn start(&self, text: &str, voice: &str) -> Result<RawAudioStream<'_>, KokoroError> {
        if !self.voices.contains(voice) {
            return Err(KokoroError::VoiceNotFound(voice.to_string()));
        }

        let ids = self
            .phonemizer
            .phonemize(text, voice_language(voice), &self.vocab)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(Box::new(std::iter::empty()));
        }

        // One style for the whole paragraph, picked by its full length.
        let style = self.voices.style(voice, ids.len())?;
        let windows = phoneme_windows(&ids, &self.vocab.clause_boundaries(), MAX_PHONEME_LEN);
        log::debug!(
            "Kokoro: {} phoneme tokens in {} window(s) for voice {voice}",
            ids.len(),
            windows.len()
        );

        let speed = self.speed;
        Ok(Box::new(windows.into_iter().map(move |window| -> Result<RawAudio, EngineError> {
            let mut model = self.model.lock().map_err(|_| KokoroError::Poisoned)?;
            Ok(model.infer(&window, &style, speed)?)
        })))
    }
}

impl SpeechEngine for KokoroEngine {
    fn synthesize<'a>(&'a self, text: &str, voice: &str) -> Result<RawAudioStream<'a>, EngineError> {
        Ok(self.start(text, voice)?)
    }

    fn voices(&self) -> Vec<String> {
        self.voices.names()
    }
}

impl From<KokoroError> for EngineError {
    fn from(err: KokoroError) -> Self {
        match err {
            KokoroError::VoiceNotFound(voice) => EngineError::VoiceNotFound(voice),
            other => EngineError::Backend(Box::new(other)),
        }
    }
}
