use std::path::{Path, PathBuf};

use ndarray::{arr1, Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::voices::Style;
use crate::RawAudio;

/// Longest phoneme window the model accepts, before the two padding tokens.
pub const MAX_PHONEME_LEN: usize = 510;

/// Style embedding width.
pub const STYLE_DIM: usize = 256;

const PREFERRED_ONNX: &str = "kokoro-quant-convinteger.onnx";

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found")]
    VoiceNotFound(String),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Model produced no output tensor")]
    NoOutput,
    #[error("Kokoro session lock poisoned by an earlier panic")]
    Poisoned,
}

/// The ONNX session and the input layout it was exported with.
pub struct KokoroModel {
    session: Session,
    /// `"input_ids"` or `"tokens"`, depending on the export.
    tokens_input: String,
    speed_is_int32: bool,
}

impl KokoroModel {
    pub fn load(
        onnx_path: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        log::info!("Loading Kokoro model from {}", onnx_path.display());
        let session = open_session(onnx_path, num_threads, optimized_cache_path)?;

        let tokens_input = session
            .inputs()
            .iter()
            .map(|input| input.name())
            .find(|name| *name == "input_ids" || *name == "tokens")
            .unwrap_or("input_ids")
            .to_string();
        // Newer exports take an int32 speed; assume that unless the graph says otherwise.
        let speed_is_int32 = session
            .inputs()
            .iter()
            .find(|input| input.name() == "speed")
            .map_or(true, |input| {
                format!("{:?}", input.dtype()).to_lowercase().contains("int32")
            });
        log::info!("Detected: tokens_input='{tokens_input}', speed_is_int32={speed_is_int32}");

        Ok(Self {
            session,
            tokens_input,
            speed_is_int32,
        })
    }

    /// Run one phoneme window through the model.
    ///
    /// The returned buffer keeps the output tensor's shape (`[1, n]` for
    /// batched exports).
    pub fn infer(&mut self, tokens: &[i64], style: &Style, speed: f32) -> Result<RawAudio, KokoroError> {
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style = ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let outputs = if self.speed_is_int32 {
            let speed = arr1(&[speed.round() as i32]);
            self.session.run(inputs![
                self.tokens_input.as_str() => TensorRef::from_array_view(tokens.view())?,
                "style" => TensorRef::from_array_view(style)?,
                "speed" => TensorRef::from_array_view(speed.view())?,
            ])?
        } else {
            let speed = arr1(&[speed]);
            self.session.run(inputs![
                self.tokens_input.as_str() => TensorRef::from_array_view(tokens.view())?,
                "style" => TensorRef::from_array_view(style)?,
                "speed" => TensorRef::from_array_view(speed.view())?,
            ])?
        };

        let (_, waveform) = outputs.iter().next().ok_or(KokoroError::NoOutput)?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(RawAudio {
            shape: waveform.shape().to_vec(),
            samples: waveform.iter().copied().collect(),
        })
    }
}

/// The ONNX file in `model_dir`: the quantized export if present, otherwise
/// the first `.onnx` found.
pub fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join(PREFERRED_ONNX);
    if preferred.exists() {
        return Ok(preferred);
    }
    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "onnx") {
            return Ok(path);
        }
    }
    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Build the session, reusing a previously optimized graph when one exists.
///
/// With a cache path the first start pays for Level3 optimization and writes
/// the result there; later starts load it with optimization disabled.
fn open_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let cached = optimized_cache_path.filter(|cache| cache.exists());
    let (load_path, level) = match cached {
        Some(cache) => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            (cache, GraphOptimizationLevel::Disable)
        }
        None => (onnx_path, GraphOptimizationLevel::Level3),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(level)?
        .with_execution_providers(vec![CPUExecutionProvider::default().build()])?
        .with_parallel_execution(true)?;

    if let (None, Some(cache)) = (cached, optimized_cache_path) {
        log::info!("Saving optimized Kokoro graph to {}", cache.display());
        builder = builder.with_optimized_model_path(cache)?;
    }
    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Cut `ids` into windows of at most `max_len` tokens.
///
/// A window ends just after its last clause boundary when it has one, so cuts
/// fall between clauses rather than inside words.
pub fn phoneme_windows(ids: &[i64], boundaries: &[i64], max_len: usize) -> Vec<Vec<i64>> {
    let mut windows = Vec::new();
    let mut rest = ids;
    while rest.len() > max_len {
        let cut = rest[..max_len]
            .iter()
            .rposition(|id| boundaries.contains(id))
            .map_or(max_len, |i| i + 1);
        windows.push(rest[..cut].to_vec());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        windows.push(rest.to_vec());
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequences_are_one_window() {
        assert_eq!(phoneme_windows(&[7, 8, 9], &[4], 5), vec![vec![7, 8, 9]]);
        assert!(phoneme_windows(&[], &[4], 5).is_empty());
    }

    #[test]
    fn cuts_after_last_boundary_in_window() {
        let ids = [7, 4, 8, 3, 9, 9, 9, 4];
        assert_eq!(
            phoneme_windows(&ids, &[3, 4], 5),
            vec![vec![7, 4, 8, 3], vec![9, 9, 9, 4]]
        );
    }

    #[test]
    fn hard_cut_without_boundary() {
        let ids = [9; 12];
        let windows = phoneme_windows(&ids, &[4], 5);
        assert_eq!(
            windows.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![5, 5, 2]
        );
    }

    #[test]
    fn windows_never_exceed_model_limit() {
        let ids: Vec<i64> = (0..2000).map(|i| if i % 97 == 0 { 4 } else { 50 }).collect();
        let windows = phoneme_windows(&ids, &[4], MAX_PHONEME_LEN);
        assert!(windows.iter().all(|w| w.len() <= MAX_PHONEME_LEN));
        assert_eq!(windows.concat(), ids);
    }

    #[test]
    fn missing_model_dir_is_io_error() {
        assert!(matches!(
            find_onnx_file(Path::new("/nonexistent/kokoro")),
            Err(KokoroError::Io(_))
        ));
    }
}
