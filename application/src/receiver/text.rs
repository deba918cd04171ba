//! Receiver for text turns over server-sent events.

use crate::ports::transport::StreamTransport;
use crate::receiver::framing::sse_frames;
use crate::receiver::state::ReceiverState;
use crate::receiver::turn::{TurnContext, TurnOutcome, TurnWriter, run_turn};
use murmur_domain::EventStreamRequestBody;
use tokio::sync::watch;

/// Streams one assistant reply from the event-stream endpoint.
pub struct TextStreamReceiver {
    writer: TurnWriter,
}

impl TextStreamReceiver {
    pub fn new(ctx: TurnContext) -> Self {
        Self {
            writer: TurnWriter::new(ctx),
        }
    }

    /// Lifecycle of this receiver, observable after `run` takes it.
    pub fn watch_state(&self) -> watch::Receiver<ReceiverState> {
        self.writer.watch_state()
    }

    pub async fn run(
        mut self,
        transport: &dyn StreamTransport,
        body: &EventStreamRequestBody,
    ) -> TurnOutcome {
        run_turn(
            &mut self.writer,
            transport.open_event_stream(body),
            sse_frames,
        )
        .await
    }
}
