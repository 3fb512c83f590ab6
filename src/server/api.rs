use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use super::sse;
use super::state::AppState;
use crate::error::PodcastError;
use crate::pipeline::collect_waveform;
use crate::voices::{VoiceMap, DEFAULT_GUEST_VOICE, DEFAULT_HOST_VOICE};

#[derive(Debug, Deserialize)]
pub struct PodcastQuery {
    pub text: Option<String>,
    pub host_voice: Option<String>,
    pub guest_voice: Option<String>,
}

impl PodcastQuery {
    fn validate(self) -> Result<(String, VoiceMap), PodcastError> {
        let (Some(text), Some(host), Some(guest)) = (self.text, self.host_voice, self.guest_voice)
        else {
            return Err(PodcastError::InvalidRequest(
                "Missing 'text', 'host_voice' or 'guest_voice' query parameter".to_string(),
            ));
        };
        let text = require_text(text)?;
        let voices = VoiceMap::new(host, guest);
        if voices.is_empty() {
            return Err(PodcastError::InvalidRequest("Voice cannot be empty".to_string()));
        }
        Ok((text, voices))
    }
}

/// Query of the single-voice stream, also the body of `POST /api/tts`.
#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: Option<String>,
    pub voice: Option<String>,
}

impl SpeechRequest {
    fn validate(self) -> Result<(String, String), PodcastError> {
        let (Some(text), Some(voice)) = (self.text, self.voice) else {
            return Err(PodcastError::InvalidRequest(
                "Missing 'text' or 'voice' query parameter".to_string(),
            ));
        };
        if voice.trim().is_empty() {
            return Err(PodcastError::InvalidRequest("Voice cannot be empty".to_string()));
        }
        Ok((require_text(text)?, voice))
    }
}

fn require_text(text: String) -> Result<String, PodcastError> {
    if text.trim().is_empty() {
        return Err(PodcastError::InvalidRequest("Text cannot be empty".to_string()));
    }
    Ok(text)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine_ready: bool,
    pub model_ready: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoicesResponse {
    pub voices: Vec<String>,
    pub default_host: String,
    pub default_guest: String,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    log::info!("Creating API router with endpoints:");
    log::info!("  GET  /health");
    log::info!("  GET  /api/voices");
    log::info!("  GET  /api/podcast-stream");
    log::info!("  GET  /api/tts-stream");
    log::info!("  POST /api/tts");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/voices", get(list_voices))
        .route("/api/podcast-stream", get(podcast_stream))
        .route("/api/tts-stream", get(tts_stream))
        .route("/api/tts", post(tts))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    log::debug!("Health check endpoint called");
    Json(HealthResponse {
        status: "healthy".to_string(),
        engine_ready: state.engine_ready(),
        model_ready: state.model_ready(),
    })
}

async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.voices(),
        default_host: DEFAULT_HOST_VOICE.to_string(),
        default_guest: DEFAULT_GUEST_VOICE.to_string(),
    })
}

/// Script generation followed by two-voice synthesis, as one event stream.
async fn podcast_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PodcastQuery>,
) -> Response {
    let pipeline = match state.pipeline() {
        Ok(pipeline) => pipeline,
        Err(e) => return reject(&e),
    };
    let (text, voices) = match query.validate() {
        Ok(request) => request,
        Err(e) => return reject(&e),
    };
    log::info!(
        "Podcast stream requested ({} chars, voices: {voices:?})",
        text.chars().count()
    );

    sse::spawn_stream(move |sink| match pipeline.run(&text, voices) {
        Ok(events) => sink.forward(events),
        Err(e) => sink.fail(&e),
    })
    .into_response()
}

/// `text` read by a single voice, as one event stream.
async fn tts_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpeechRequest>,
) -> Response {
    let synthesizer = match state.synthesizer() {
        Ok(synthesizer) => synthesizer,
        Err(e) => return reject(&e),
    };
    let (text, voice) = match query.validate() {
        Ok(request) => request,
        Err(e) => return reject(&e),
    };
    log::info!("TTS stream requested with voice '{voice}'");

    sse::spawn_stream(move |sink| sink.forward(synthesizer.synthesize_text(&text, &voice)))
        .into_response()
}

/// `text` read by a single voice, returned as one WAV file.
async fn tts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, AppError> {
    let synthesizer = state.synthesizer()?;
    let (text, voice) = request.validate()?;

    let start = Instant::now();
    let wav = tokio::task::spawn_blocking(move || {
        collect_waveform(synthesizer.synthesize_text(&text, &voice))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;
    log::info!(
        "Synthesized {:.2}s of audio in {:.2}s",
        wav.duration_secs(),
        start.elapsed().as_secs_f64()
    );

    let bytes = wav
        .to_wav_bytes()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response())
}

fn status_for(err: &PodcastError) -> StatusCode {
    match err {
        PodcastError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PodcastError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: &PodcastError) -> Response {
    log::warn!("Rejecting stream request: {err}");
    let message = match err {
        PodcastError::InvalidRequest(msg) | PodcastError::ServiceUnavailable(msg) => msg.clone(),
        other => other.to_string(),
    };
    sse::reject(status_for(err), &message)
}

// Error handling
#[derive(Debug)]
pub enum AppError {
    Podcast(PodcastError),
    Internal(String),
}

impl From<PodcastError> for AppError {
    fn from(err: PodcastError) -> Self {
        AppError::Podcast(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Podcast(err) => (status_for(&err), err.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        log::error!("Request failed ({status}): {message}");

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{fenced_script, CannedModel, FakeEngine};
    use crate::llm::{DecodingParams, LanguageModel};
    use crate::server::Service;
    use crate::SpeechEngine;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::io::Cursor;
    use tower::ServiceExt;

    fn ready_state(model: Arc<dyn LanguageModel>, engine: Arc<dyn SpeechEngine>) -> Arc<AppState> {
        Arc::new(AppState::new(
            Service::Ready(model),
            Service::Ready(engine),
            DecodingParams::default(),
        ))
    }

    async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, String, Vec<u8>) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// `(event, data)` pairs, skipping keep-alive comments.
    fn parse_events(body: &[u8]) -> Vec<(String, String)> {
        String::from_utf8_lossy(body)
            .split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = Some(value.trim_start().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                name.map(|name| (name, data))
            })
            .collect()
    }

    fn names(events: &[(String, String)]) -> Vec<&str> {
        events.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[tokio::test]
    async fn podcast_stream_sends_status_audio_then_end() {
        let model = CannedModel::answering(&fenced_script());
        let engine = Arc::new(FakeEngine::default());
        let (status, content_type, body) = send(
            ready_state(model.clone(), engine.clone()),
            get("/api/podcast-stream?text=The%20ocean&host_voice=af_heart&guest_voice=am_echo"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/event-stream"));
        let events = parse_events(&body);
        assert_eq!(events[0], ("status".to_string(), "Generating script...".to_string()));
        assert_eq!(events[1].1, "Script ready: The Ocean (3 paragraphs)");
        assert_eq!(events[2].1, "Synthesizing paragraph 1/3 (Speaker: Host)");
        assert_eq!(events.iter().filter(|(n, _)| n == "audio_chunk").count(), 6);
        assert_eq!(
            events.last(),
            Some(&("stream_end".to_string(), "finished".to_string()))
        );
        assert_eq!(model.calls(), 1);
        assert_eq!(engine.call_count(), 3);

        let (_, audio) = events.iter().find(|(n, _)| n == "audio_chunk").unwrap();
        let wav = STANDARD.decode(audio).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.spec().bits_per_sample, 16);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_the_model_is_called() {
        let model = CannedModel::answering(&fenced_script());
        let (status, content_type, body) = send(
            ready_state(model.clone(), Arc::new(FakeEngine::default())),
            get("/api/podcast-stream?text=%20%20&host_voice=af_heart&guest_voice=am_echo"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type, "text/event-stream");
        assert_eq!(
            parse_events(&body),
            vec![("stream_error".to_string(), "Text cannot be empty".to_string())]
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_voice_is_rejected() {
        let (status, _, body) = send(
            ready_state(CannedModel::answering("{}"), Arc::new(FakeEngine::default())),
            get("/api/podcast-stream?text=hello&host_voice=af_heart"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(names(&parse_events(&body)), vec!["stream_error"]);
    }

    #[tokio::test]
    async fn blank_voice_pair_is_rejected_before_the_model_is_called() {
        let model = CannedModel::answering(&fenced_script());
        let engine = Arc::new(FakeEngine::default());
        let (status, _, body) = send(
            ready_state(model.clone(), engine.clone()),
            get("/api/podcast-stream?text=The%20ocean&host_voice=&guest_voice=%20"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            parse_events(&body),
            vec![("stream_error".to_string(), "Voice cannot be empty".to_string())]
        );
        assert_eq!(model.calls(), 0);
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn one_blank_voice_skips_that_speaker() {
        let engine = Arc::new(FakeEngine::default());
        let (status, _, body) = send(
            ready_state(CannedModel::answering(&fenced_script()), engine.clone()),
            get("/api/podcast-stream?text=The%20ocean&host_voice=af_heart&guest_voice="),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&parse_events(&body)).last(), Some(&"stream_end"));
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn engine_failure_mid_podcast_keeps_earlier_audio() {
        let engine = Arc::new(FakeEngine {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let (status, _, body) = send(
            ready_state(CannedModel::answering(&fenced_script()), engine.clone()),
            get("/api/podcast-stream?text=The%20ocean&host_voice=af_heart&guest_voice=am_echo"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let events = parse_events(&body);
        assert_eq!(
            names(&events),
            vec![
                "status",
                "status",
                "status",
                "audio_chunk",
                "audio_chunk",
                "status",
                "stream_error"
            ]
        );
        assert_eq!(events[5].1, "Synthesizing paragraph 2/3 (Speaker: Guest)");
        let message = String::from_utf8(STANDARD.decode(&events[6].1).unwrap()).unwrap();
        assert!(message.starts_with("Speech synthesis failed"), "{message}");
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_engine_answers_503() {
        let model: Arc<dyn LanguageModel> = CannedModel::answering("{}");
        let state = Arc::new(AppState::new(
            Service::Ready(model),
            Service::Unavailable("TTS service not available".to_string()),
            DecodingParams::default(),
        ));
        let (status, _, body) = send(
            state,
            get("/api/podcast-stream?text=hello&host_voice=a&guest_voice=b"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            parse_events(&body),
            vec![("stream_error".to_string(), "TTS service not available".to_string())]
        );
    }

    #[tokio::test]
    async fn provider_failure_ends_stream_with_encoded_error() {
        let (status, _, body) = send(
            ready_state(CannedModel::failing(500), Arc::new(FakeEngine::default())),
            get("/api/podcast-stream?text=hello&host_voice=af_heart&guest_voice=am_echo"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let events = parse_events(&body);
        assert_eq!(names(&events), vec!["status", "stream_error"]);
        let message = String::from_utf8(STANDARD.decode(&events[1].1).unwrap()).unwrap();
        assert!(message.contains("status 500"), "{message}");
    }

    #[tokio::test]
    async fn tts_stream_reads_text_with_one_voice() {
        let engine = Arc::new(FakeEngine::default());
        let (status, _, body) = send(
            ready_state(CannedModel::answering("{}"), engine.clone()),
            get("/api/tts-stream?text=Hello.&voice=af_sky"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            names(&parse_events(&body)),
            vec!["status", "audio_chunk", "audio_chunk", "stream_end"]
        );
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![("Hello.".to_string(), "af_sky".to_string())]
        );
    }

    #[tokio::test]
    async fn tts_returns_a_wav_file() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text":"Hello.","voice":"af_sky"}"#))
            .unwrap();
        let (status, content_type, body) = send(
            ready_state(CannedModel::answering("{}"), Arc::new(FakeEngine::default())),
            request,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "audio/wav");
        let reader = hound::WavReader::new(Cursor::new(body)).unwrap();
        assert_eq!(reader.len(), 4);
    }

    #[tokio::test]
    async fn tts_reports_errors_as_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text":" ","voice":"af_sky"}"#))
            .unwrap();
        let (status, _, body) = send(
            ready_state(CannedModel::answering("{}"), Arc::new(FakeEngine::default())),
            request,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], "Invalid request: Text cannot be empty");
    }

    #[tokio::test]
    async fn voices_and_health_describe_the_services() {
        let engine: Arc<dyn SpeechEngine> = Arc::new(FakeEngine::default());
        let state = Arc::new(AppState::new(
            Service::Unavailable("no key".to_string()),
            Service::Ready(engine),
            DecodingParams::default(),
        ));

        let (_, _, body) = send(state.clone(), get("/api/voices")).await;
        let voices: VoicesResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(voices.voices, vec!["af_heart", "am_echo"]);
        assert_eq!(voices.default_host, "af_alloy");

        let (status, _, body) = send(state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert!(health.engine_ready);
        assert!(!health.model_ready);
    }
}
