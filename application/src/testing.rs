//! In-memory fakes shared by unit tests.

use crate::ports::audio_output::{AudioError, AudioOutput, AudioOutputFactory};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::transport::{ByteStream, StreamTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use murmur_domain::audio::pcm::{mime_essence, mime_sample_rate};
use murmur_domain::{
    ChunkedRequestBody, DecodeError, EventStreamRequestBody, PcmBuffer,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A body that yields `chunks` and then ends.
pub fn body(chunks: &[&str]) -> ByteStream {
    let items: Vec<Result<Bytes, TransportError>> = chunks
        .iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
        .collect();
    futures::stream::iter(items).boxed()
}

/// A body fed by the test through the returned sender. The sender reports
/// `is_closed()` once the receiver side drops the body.
pub fn channel_body() -> (
    mpsc::UnboundedSender<Result<Bytes, TransportError>>,
    ByteStream,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (tx, stream.boxed())
}

pub fn chunk(text: &str) -> Result<Bytes, TransportError> {
    Ok(Bytes::copy_from_slice(text.as_bytes()))
}

/// Transport handing out pre-scripted bodies in order.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    event_stream_requests: Mutex<Vec<EventStreamRequestBody>>,
    chunked_requests: Mutex<Vec<ChunkedRequestBody>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<ByteStream, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn event_stream_requests(&self) -> Vec<EventStreamRequestBody> {
        self.event_stream_requests.lock().unwrap().clone()
    }

    pub fn chunked_requests(&self) -> Vec<ChunkedRequestBody> {
        self.chunked_requests.lock().unwrap().clone()
    }

    fn next(&self) -> Result<ByteStream, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".into())))
    }
}

#[async_trait]
impl StreamTransport for FakeTransport {
    async fn open_event_stream(
        &self,
        body: &EventStreamRequestBody,
    ) -> Result<ByteStream, TransportError> {
        self.event_stream_requests.lock().unwrap().push(body.clone());
        self.next()
    }

    async fn open_chunked(&self, body: &ChunkedRequestBody) -> Result<ByteStream, TransportError> {
        self.chunked_requests.lock().unwrap().push(body.clone());
        self.next()
    }
}

/// Output that decodes `audio/pcm` and records what it was asked to start.
#[derive(Default)]
pub struct FakeAudioOutput {
    started: Mutex<Vec<(usize, Duration)>>,
}

impl FakeAudioOutput {
    pub const UNSUPPORTED_MIME: &'static str = "audio/x-unsupported";

    /// `(sample count, delay)` for every started buffer.
    pub fn started(&self) -> Vec<(usize, Duration)> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioOutput for FakeAudioOutput {
    async fn decode(&self, encoded: &[u8], mime_type: &str) -> Result<PcmBuffer, DecodeError> {
        if mime_essence(mime_type) != "audio/pcm" {
            return Err(DecodeError::UnsupportedCodec(mime_type.to_string()));
        }
        let rate = mime_sample_rate(mime_type).unwrap_or(24_000);
        PcmBuffer::from_le_bytes(encoded, rate, 1)
    }

    fn start(&self, buffer: PcmBuffer, delay: Duration) -> Result<(), AudioError> {
        self.started
            .lock()
            .unwrap()
            .push((buffer.samples.len(), delay));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeOutputFactory {
    output: Arc<FakeAudioOutput>,
    created: AtomicUsize,
    failing: bool,
}

impl FakeOutputFactory {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn output(&self) -> Arc<FakeAudioOutput> {
        self.output.clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl AudioOutputFactory for FakeOutputFactory {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        if self.failing {
            return Err(AudioError::Output("no device".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Logger keeping every event in memory.
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<ConversationEvent>>,
}

impl RecordingLogger {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

impl ConversationLogger for RecordingLogger {
    fn log(&self, event: ConversationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A store with one streaming assistant message and an active playback
/// context, ready to receive a turn.
pub struct TurnHarness {
    pub store: Arc<crate::store::MessageStore>,
    pub factory: Arc<FakeOutputFactory>,
    pub playback: Arc<crate::audio::AudioPlaybackController>,
    pub message_id: murmur_domain::MessageId,
    pub cancel: tokio_util::sync::CancellationToken,
    pub logger: Arc<RecordingLogger>,
}

impl TurnHarness {
    pub fn new() -> Self {
        use crate::audio::{AudioPlaybackController, PlaybackContext};
        use crate::config::PlaybackPolicy;

        let store = Arc::new(crate::store::MessageStore::plain());
        let message = store
            .append(murmur_domain::ChatMessage::assistant_streaming())
            .unwrap();
        let factory = Arc::new(FakeOutputFactory::default());
        let playback = Arc::new(AudioPlaybackController::new(
            Arc::new(PlaybackContext::new(factory.clone())),
            PlaybackPolicy::Immediate,
        ));
        playback.activate();
        Self {
            store,
            factory,
            playback,
            message_id: message.id.clone(),
            cancel: tokio_util::sync::CancellationToken::new(),
            logger: Arc::new(RecordingLogger::default()),
        }
    }

    pub fn context(&self, idle_timeout: Option<Duration>) -> crate::receiver::TurnContext {
        crate::receiver::TurnContext {
            store: self.store.clone(),
            playback: self.playback.clone(),
            message_id: self.message_id.clone(),
            cancel: self.cancel.clone(),
            idle_timeout,
            logger: self.logger.clone(),
        }
    }

    pub fn message(&self) -> Arc<murmur_domain::ChatMessage> {
        self.store.get(&self.message_id).unwrap()
    }
}
