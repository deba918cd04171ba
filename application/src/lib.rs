//! Application layer for murmur
//!
//! This crate contains the message store, the stream receivers, audio
//! controllers, port definitions and session orchestration.
//! It depends only on the domain layer.

pub mod audio;
pub mod config;
pub mod ports;
pub mod receiver;
pub mod store;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use audio::{
    AudioCaptureController, AudioPlaybackController, PlaybackContext, PlaybackOutcome,
    RecordingInfo,
};
pub use config::{DEFAULT_IDLE_TIMEOUT, PlaybackPolicy, SessionConfig, TransportKind};
pub use ports::{
    audio_output::{AudioError, AudioOutput, AudioOutputFactory},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    media::{CaptureError, MediaDevices, MediaRecorder, MediaStream},
    token_provider::{NoToken, StaticToken, TokenProvider},
    transport::{ByteStream, StreamTransport, TransportError},
};
pub use receiver::{
    ChunkedStreamReceiver, CloseReason, ReceiverState, TextStreamReceiver, TurnContext,
    TurnError, TurnOutcome,
};
pub use store::{MessageStore, StoreChange};
pub use use_cases::session_controller::{
    SessionController, SessionError, TurnHandle, VOICE_MESSAGE_PLACEHOLDER,
};
