use std::fmt::Display;
use std::sync::Arc;

use crate::error::PodcastError;
use crate::llm::{DecodingParams, LanguageModel};
use crate::pipeline::{PodcastPipeline, Synthesizer};
use crate::voices::VOICE_OPTIONS;
use crate::SpeechEngine;

/// A process-wide dependency that either initialized or did not.
///
/// Construction failures are kept, not fatal: the server still starts and
/// every request that needs the dependency is refused with the stored reason.
pub enum Service<T: ?Sized> {
    Ready(Arc<T>),
    Unavailable(String),
}

impl<T: ?Sized> Service<T> {
    /// Wrap a startup result, logging the outcome under `name`.
    pub fn from_result<E: Display>(name: &str, result: Result<Arc<T>, E>) -> Self {
        match result {
            Ok(service) => {
                log::info!("{name} ready");
                Service::Ready(service)
            }
            Err(e) => {
                log::error!("{name} failed to initialize: {e}");
                Service::Unavailable(format!("{name} not available: {e}"))
            }
        }
    }

    pub fn get(&self) -> Result<Arc<T>, PodcastError> {
        match self {
            Service::Ready(service) => Ok(Arc::clone(service)),
            Service::Unavailable(reason) => Err(PodcastError::ServiceUnavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Service::Ready(_))
    }
}

impl<T: ?Sized> Clone for Service<T> {
    fn clone(&self) -> Self {
        match self {
            Service::Ready(service) => Service::Ready(Arc::clone(service)),
            Service::Unavailable(reason) => Service::Unavailable(reason.clone()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    model: Service<dyn LanguageModel>,
    engine: Service<dyn SpeechEngine>,
    decoding: DecodingParams,
}

impl AppState {
    pub fn new(
        model: Service<dyn LanguageModel>,
        engine: Service<dyn SpeechEngine>,
        decoding: DecodingParams,
    ) -> Self {
        Self {
            model,
            engine,
            decoding,
        }
    }

    /// Everything a dialogue request needs. The engine is checked first.
    pub fn pipeline(&self) -> Result<PodcastPipeline, PodcastError> {
        let engine = self.engine.get()?;
        let model = self.model.get()?;
        Ok(PodcastPipeline::new(model, engine, self.decoding))
    }

    pub fn synthesizer(&self) -> Result<Synthesizer, PodcastError> {
        self.engine.get().map(Synthesizer::new)
    }

    pub fn model_ready(&self) -> bool {
        self.model.is_ready()
    }

    pub fn engine_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Voices reported by the engine, or the advertised list when it cannot say.
    pub fn voices(&self) -> Vec<String> {
        let known = match &self.engine {
            Service::Ready(engine) => engine.voices(),
            Service::Unavailable(_) => Vec::new(),
        };
        if known.is_empty() {
            VOICE_OPTIONS.iter().map(|v| v.to_string()).collect()
        } else {
            known
        }
    }
}
