//! Stream receivers.
//!
//! A receiver owns one turn: it opens the transport, decodes frames as
//! bytes arrive and writes them to the assistant message through the
//! store. Both transports share [`turn::TurnWriter`] and differ only in
//! framing.

pub mod chunked;
pub mod framing;
pub mod state;
pub mod text;
pub mod turn;

pub use chunked::ChunkedStreamReceiver;
pub use framing::{FrameError, FrameStream, chunked_frames, sse_frames};
pub use state::{CloseReason, InvalidTransition, ReceiverInput, ReceiverState};
pub use text::TextStreamReceiver;
pub use turn::{TURN_FAILED_MESSAGE, TurnContext, TurnError, TurnOutcome, TurnWriter};
