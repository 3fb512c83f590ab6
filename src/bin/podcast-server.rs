use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use podcast_tts::config::{ModelConfigBuilder, ServerConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use podcast_tts::llm::openai::OpenAiCompatible;
use podcast_tts::llm::{DecodingParams, LanguageModel};
use podcast_tts::server::{self, AppState, Service};
use podcast_tts::SpeechEngine;

#[derive(Parser, Debug)]
#[command(name = "podcast-server")]
#[command(about = "Stream two-speaker podcasts generated from source text over SSE")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "PODCAST_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = podcast_tts::config::DEFAULT_PORT, env = "PODCAST_PORT")]
    port: u16,

    /// API key for the script-writing model
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Script-writing model name
    #[arg(long, default_value = DEFAULT_MODEL, env = "SCRIPTER_MODEL")]
    model: String,

    /// OpenAI-compatible endpoint of the script-writing model
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Upper bound on script length, in model tokens
    #[arg(long, default_value_t = 8000)]
    max_tokens: u32,

    /// Give up on the model after this many seconds (default: wait)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Kokoro model directory
    #[arg(long, default_value = "models/kokoro", env = "KOKORO_MODEL_DIR")]
    model_dir: PathBuf,

    /// Inference threads (default: ONNX Runtime's choice)
    #[arg(long)]
    threads: Option<usize>,

    /// Where to cache the optimized ONNX graph
    #[arg(long)]
    graph_cache: Option<PathBuf>,

    /// espeak-ng binary (default: from PATH)
    #[arg(long, env = "ESPEAK_BIN")]
    espeak_bin: Option<PathBuf>,

    /// espeak-ng data directory
    #[arg(long, env = "ESPEAK_DATA_PATH")]
    espeak_data: Option<PathBuf>,

    /// Speech speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f32,
}

impl Args {
    fn decoding(&self) -> DecodingParams {
        DecodingParams {
            max_tokens: self.max_tokens,
            ..DecodingParams::default()
        }
    }
}

fn script_writer(args: &Args) -> Result<Arc<dyn LanguageModel>, Box<dyn std::error::Error>> {
    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or("GEMINI_API_KEY is not set")?;

    let mut builder = ModelConfigBuilder::default();
    builder
        .api_key(api_key)
        .base_url(args.base_url.clone())
        .model(args.model.clone())
        .decoding(args.decoding());
    if let Some(secs) = args.timeout_secs {
        builder.timeout(Duration::from_secs(secs));
    }
    let config = builder.build()?;

    log::info!("Script writer: {} at {}", config.model, config.base_url);
    Ok(Arc::new(OpenAiCompatible::new(&config)?))
}

#[cfg(feature = "kokoro")]
fn speech_engine(args: &Args) -> Result<Arc<dyn SpeechEngine>, Box<dyn std::error::Error>> {
    use podcast_tts::engines::kokoro::{EspeakConfig, KokoroEngine, KokoroModelParams};

    let params = KokoroModelParams {
        num_threads: args.threads,
        optimized_model_cache_path: args.graph_cache.clone(),
        espeak: EspeakConfig {
            bin_path: args.espeak_bin.clone(),
            data_path: args.espeak_data.clone(),
        },
        speed: args.speed,
    };

    let load_start = std::time::Instant::now();
    let engine = KokoroEngine::load(&args.model_dir, params)?;
    log::info!(
        "Kokoro loaded from {} in {:.2?} ({} voices)",
        args.model_dir.display(),
        load_start.elapsed(),
        engine.voices().len()
    );
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "kokoro"))]
fn speech_engine(_args: &Args) -> Result<Arc<dyn SpeechEngine>, Box<dyn std::error::Error>> {
    Err("built without the `kokoro` feature".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let model = Service::from_result("Script writer", script_writer(&args));
    let engine = Service::from_result("TTS service", speech_engine(&args));
    let state = AppState::new(model, engine, args.decoding());

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
    };
    server::serve(config, state).await?;
    Ok(())
}
