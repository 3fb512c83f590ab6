//! Kokoro-82M text-to-speech engine.
//!
//! Runs the Kokoro ONNX export through ONNX Runtime and phonemizes with the
//! `espeak-ng` command line tool, which must be installed:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # preferred; any other .onnx is used otherwise
//! ├── voices-v1.0.bin                 # voice style archive (.npz)
//! └── config.json                     # optional vocabulary, built-in table otherwise
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>
//!
//! # Voices
//!
//! Voice ids are `{language}{gender}_{name}`; the language letter picks the
//! espeak-ng voice: `a` American English, `b` British English, `e` Spanish,
//! `f` French, `h` Hindi, `i` Italian, `j` Japanese, `p` Brazilian Portuguese,
//! `z` Mandarin.
//!
//! A paragraph longer than 510 phoneme tokens is split at clause punctuation
//! and each piece is a separate inference, delivered as its own buffer.

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod vocab;
pub mod voices;

pub use engine::{KokoroEngine, KokoroModelParams};
pub use model::KokoroError;
pub use phonemizer::EspeakConfig;
