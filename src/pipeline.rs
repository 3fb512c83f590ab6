//! Script-to-speech orchestration.
//!
//! Both stages are pull-based iterators of [`PipelineEvent`]s: nothing happens
//! until the consumer asks for the next event, and a consumer that stops
//! pulling stops the work. Paragraphs are synthesized strictly one after the
//! other, in document order.

use std::sync::Arc;

use crate::error::PodcastError;
use crate::llm::{DecodingParams, LanguageModel};
use crate::script::{ScriptDocument, ScriptGenerator};
use crate::voices::{Speaker, VoiceMap};
use crate::{AudioChunk, RawAudioStream, SpeechEngine};

/// Everything a request emits, in order.
///
/// A stream ends with exactly one terminal event: [`PipelineEvent::Completed`]
/// or [`PipelineEvent::Failed`].
#[derive(Debug)]
pub enum PipelineEvent {
    Started,
    ScriptReady(ScriptDocument),
    SynthesizingParagraph {
        /// 1-based position of the paragraph in the document.
        index: usize,
        total: usize,
        speaker: Speaker,
    },
    Audio(AudioChunk),
    /// The full waveform: every `Audio` chunk of the request, concatenated.
    Completed(AudioChunk),
    Failed(PodcastError),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Completed(_) | PipelineEvent::Failed(_))
    }

    /// Human-readable progress line, for the events that have one.
    pub fn status_text(&self) -> Option<String> {
        match self {
            PipelineEvent::Started => Some("Generating script...".to_string()),
            PipelineEvent::ScriptReady(script) => Some(format!(
                "Script ready: {} ({} paragraphs)",
                script.title(),
                script.paragraph_count()
            )),
            PipelineEvent::SynthesizingParagraph {
                index,
                total,
                speaker,
            } => Some(format!(
                "Synthesizing paragraph {index}/{total} (Speaker: {speaker})"
            )),
            PipelineEvent::Completed(_) => Some("Finished!".to_string()),
            PipelineEvent::Audio(_) | PipelineEvent::Failed(_) => None,
        }
    }
}

/// Drives a [`SpeechEngine`] over a script, one paragraph at a time.
#[derive(Clone)]
pub struct Synthesizer {
    engine: Arc<dyn SpeechEngine>,
}

struct Line {
    index: usize,
    speaker: Speaker,
    text: String,
}

impl Synthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn SpeechEngine> {
        &self.engine
    }

    /// Lazily synthesize every paragraph of `document`.
    ///
    /// Paragraphs whose speaker has no voice in `voices` are skipped with a
    /// warning; they still count towards the paragraph numbering.
    pub fn synthesize(&self, document: &ScriptDocument, voices: VoiceMap) -> SynthesisStream<'_> {
        let lines: Vec<Line> = document
            .paragraphs()
            .enumerate()
            .map(|(i, p)| Line {
                index: i + 1,
                speaker: p.speaker(),
                text: p.text().to_string(),
            })
            .collect();
        SynthesisStream::new(self.engine.as_ref(), lines, voices)
    }

    /// Synthesize a single piece of text read by one voice.
    pub fn synthesize_text(&self, text: &str, voice: &str) -> SynthesisStream<'_> {
        let line = Line {
            index: 1,
            speaker: Speaker::Host,
            text: text.trim().to_string(),
        };
        SynthesisStream::new(self.engine.as_ref(), vec![line], VoiceMap::single(voice))
    }
}

/// Iterator returned by [`Synthesizer::synthesize`].
///
/// Per paragraph it yields a `SynthesizingParagraph` event, then one `Audio`
/// event per non-empty engine buffer. The engine is only invoked when the
/// event after the progress event is requested.
pub struct SynthesisStream<'a> {
    engine: &'a dyn SpeechEngine,
    sample_rate: u32,
    voices: VoiceMap,
    lines: std::vec::IntoIter<Line>,
    total: usize,
    /// Text and voice announced but not yet handed to the engine.
    pending: Option<(String, String)>,
    current: Option<RawAudioStream<'a>>,
    waveform: Vec<f32>,
    done: bool,
}

impl<'a> SynthesisStream<'a> {
    fn new(engine: &'a dyn SpeechEngine, lines: Vec<Line>, voices: VoiceMap) -> Self {
        Self {
            engine,
            sample_rate: engine.sample_rate(),
            voices,
            total: lines.len(),
            lines: lines.into_iter(),
            pending: None,
            current: None,
            waveform: Vec::new(),
            done: false,
        }
    }

    /// Number of paragraphs in the script, including skipped ones.
    pub fn total(&self) -> usize {
        self.total
    }

    fn fail(&mut self, err: PodcastError) -> PipelineEvent {
        log::error!("Synthesis aborted: {err}");
        self.done = true;
        self.current = None;
        self.pending = None;
        PipelineEvent::Failed(err)
    }

    fn finish(&mut self) -> PipelineEvent {
        self.done = true;
        if self.waveform.is_empty() {
            log::error!("No audio was generated from the script");
            return PipelineEvent::Failed(PodcastError::EmptyResult);
        }

        let waveform = AudioChunk {
            samples: std::mem::take(&mut self.waveform),
            sample_rate: self.sample_rate,
        };
        log::info!(
            "Finished! Total paragraphs: {} ({:.2}s of audio)",
            self.total,
            waveform.duration_secs()
        );
        PipelineEvent::Completed(waveform)
    }
}

impl Iterator for SynthesisStream<'_> {
    type Item = PipelineEvent;

    fn next(&mut self) -> Option<PipelineEvent> {
        if self.done {
            return None;
        }

        loop {
            if let Some(stream) = self.current.as_mut() {
                match stream.next() {
                    Some(Ok(raw)) => match raw.into_chunk(self.sample_rate) {
                        Ok(chunk) if chunk.is_empty() => continue,
                        Ok(chunk) => {
                            self.waveform.extend_from_slice(&chunk.samples);
                            return Some(PipelineEvent::Audio(chunk));
                        }
                        Err(e) => return Some(self.fail(e.into())),
                    },
                    Some(Err(e)) => return Some(self.fail(e.into())),
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            if let Some((text, voice)) = self.pending.take() {
                let engine = self.engine;
                match engine.synthesize(&text, &voice) {
                    Ok(stream) => {
                        self.current = Some(stream);
                        continue;
                    }
                    Err(e) => return Some(self.fail(e.into())),
                }
            }

            let Some(line) = self.lines.next() else {
                return Some(self.finish());
            };

            match self.voices.voice_for(line.speaker) {
                Some(voice) => {
                    log::info!(
                        "Synthesizing paragraph {}/{} (Speaker: {}, voice: {voice})",
                        line.index,
                        self.total,
                        line.speaker
                    );
                    self.pending = Some((line.text, voice.to_string()));
                    return Some(PipelineEvent::SynthesizingParagraph {
                        index: line.index,
                        total: self.total,
                        speaker: line.speaker,
                    });
                }
                None => {
                    log::warn!(
                        "No voice assigned to speaker '{}'. Skipping paragraph {}.",
                        line.speaker,
                        line.index
                    );
                }
            }
        }
    }
}

/// Source text in, podcast events out.
#[derive(Clone)]
pub struct PodcastPipeline {
    generator: ScriptGenerator,
    synthesizer: Synthesizer,
}

impl PodcastPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        engine: Arc<dyn SpeechEngine>,
        params: DecodingParams,
    ) -> Self {
        Self::from_parts(ScriptGenerator::new(model, params), Synthesizer::new(engine))
    }

    pub fn from_parts(generator: ScriptGenerator, synthesizer: Synthesizer) -> Self {
        Self {
            generator,
            synthesizer,
        }
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Start a request. Blank source text is rejected before any model call.
    pub fn run(&self, source_text: &str, voices: VoiceMap) -> Result<PodcastStream<'_>, PodcastError> {
        if source_text.trim().is_empty() {
            return Err(PodcastError::InvalidRequest(
                "source text must not be empty".to_string(),
            ));
        }
        Ok(PodcastStream {
            pipeline: self,
            stage: Stage::Start(source_text.to_string(), voices),
        })
    }
}

enum Stage<'a> {
    Start(String, VoiceMap),
    Generate(String, VoiceMap),
    Synthesize(SynthesisStream<'a>),
    Done,
}

/// Iterator returned by [`PodcastPipeline::run`].
///
/// Emits `Started`, runs the generator when the next event is pulled, emits
/// `ScriptReady`, then every event of the synthesis stage.
pub struct PodcastStream<'a> {
    pipeline: &'a PodcastPipeline,
    stage: Stage<'a>,
}

impl Iterator for PodcastStream<'_> {
    type Item = PipelineEvent;

    fn next(&mut self) -> Option<PipelineEvent> {
        let pipeline = self.pipeline;
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Start(source_text, voices) => {
                self.stage = Stage::Generate(source_text, voices);
                Some(PipelineEvent::Started)
            }
            Stage::Generate(source_text, voices) => {
                match pipeline.generator.generate(&source_text) {
                    Ok(script) => {
                        self.stage =
                            Stage::Synthesize(pipeline.synthesizer.synthesize(&script, voices));
                        Some(PipelineEvent::ScriptReady(script))
                    }
                    Err(e) => {
                        log::error!("Script generation failed: {e}");
                        Some(PipelineEvent::Failed(e.into()))
                    }
                }
            }
            Stage::Synthesize(mut stream) => {
                let event = stream.next();
                if event.is_some() {
                    self.stage = Stage::Synthesize(stream);
                }
                event
            }
            Stage::Done => None,
        }
    }
}

/// Drain `events` down to the final waveform, or the error that ended them.
pub fn collect_waveform(
    events: impl IntoIterator<Item = PipelineEvent>,
) -> Result<AudioChunk, PodcastError> {
    for event in events {
        match event {
            PipelineEvent::Completed(waveform) => return Ok(waveform),
            PipelineEvent::Failed(err) => return Err(err),
            _ => {}
        }
    }
    Err(PodcastError::EmptyResult)
}
