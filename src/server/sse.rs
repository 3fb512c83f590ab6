//! Server-sent-event framing for pipeline events.
//!
//! | event          | data                                         |
//! |----------------|----------------------------------------------|
//! | `status`       | progress text                                |
//! | `audio_chunk`  | base64 of a 16-bit PCM mono WAV file         |
//! | `stream_end`   | `finished`                                   |
//! | `stream_error` | base64 of the error message                  |

use std::convert::Infallible;
use std::fmt::Display;

use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::pipeline::PipelineEvent;

pub const AUDIO_CHUNK: &str = "audio_chunk";
pub const STATUS: &str = "status";
pub const STREAM_END: &str = "stream_end";
pub const STREAM_ERROR: &str = "stream_error";

/// Frame one pipeline event.
///
/// Only audio can fail, when the chunk cannot be encoded as WAV.
pub fn to_sse_event(event: PipelineEvent) -> Result<Event, hound::Error> {
    let frame = match event {
        PipelineEvent::Audio(chunk) => {
            let wav = chunk.to_wav_bytes()?;
            Event::default().event(AUDIO_CHUNK).data(STANDARD.encode(wav))
        }
        PipelineEvent::Completed(_) => Event::default().event(STREAM_END).data("finished"),
        PipelineEvent::Failed(err) => error_event(&err),
        progress => Event::default()
            .event(STATUS)
            .data(progress.status_text().unwrap_or_default()),
    };
    Ok(frame)
}

/// Terminal in-stream error. The message is base64 so it survives any newline.
pub fn error_event(err: &impl Display) -> Event {
    Event::default()
        .event(STREAM_ERROR)
        .data(STANDARD.encode(err.to_string()))
}

/// Refuse a stream before it starts: `status` plus a single plain-text
/// `stream_error` event.
pub fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/event-stream")],
        format!("event: {STREAM_ERROR}\ndata: {message}\n\n"),
    )
        .into_response()
}

/// Sending half of a response stream, used from a blocking worker.
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    /// Block until the client has room for `event`. False once it has gone.
    pub fn send(&self, event: Event) -> bool {
        self.tx.blocking_send(event).is_ok()
    }

    /// Pull `events` and send each one, stopping after the terminal event or
    /// as soon as the client disconnects.
    pub fn forward(&self, events: impl IntoIterator<Item = PipelineEvent>) {
        for event in events {
            let terminal = event.is_terminal();
            let frame = match to_sse_event(event) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Failed to encode audio chunk: {e}");
                    self.send(error_event(&e));
                    return;
                }
            };
            if !self.send(frame) {
                log::info!("Client disconnected; stopping synthesis");
                return;
            }
            if terminal {
                return;
            }
        }
    }

    pub fn fail(&self, err: &impl Display) {
        self.send(error_event(err));
    }
}

/// Run `work` on a blocking thread and stream whatever it sends.
///
/// The channel holds a single frame, so the worker never runs more than one
/// event ahead of the client.
pub fn spawn_stream<F>(work: F) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnOnce(&EventSink) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || work(&EventSink { tx }));
    Sse::new(ReceiverStream::new(rx).map(Ok)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioChunk;
    use std::cell::Cell;

    #[test]
    fn stops_pulling_once_client_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = EventSink { tx };

        let pulled = Cell::new(0);
        let events = std::iter::repeat_with(|| {
            pulled.set(pulled.get() + 1);
            PipelineEvent::Started
        });
        sink.forward(events);
        assert_eq!(pulled.get(), 1);
    }

    #[test]
    fn stops_after_terminal_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = EventSink { tx };
        sink.forward(vec![
            PipelineEvent::Audio(AudioChunk::new(vec![0.1])),
            PipelineEvent::Completed(AudioChunk::new(vec![0.1])),
            PipelineEvent::Audio(AudioChunk::new(vec![0.2])),
        ]);
        drop(sink);

        let mut frames = 0;
        while rx.try_recv().is_ok() {
            frames += 1;
        }
        assert_eq!(frames, 2);
    }

    #[tokio::test]
    async fn rejection_is_a_single_plain_text_event() {
        let response = reject(StatusCode::BAD_REQUEST, "Text cannot be empty");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"event: stream_error\ndata: Text cannot be empty\n\n");
    }
}
