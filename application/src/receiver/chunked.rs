//! Receiver for turns posted to the chunked endpoint.
//!
//! Used for voice turns, and for text turns when the chunked transport is
//! configured. The response body carries one `data: {json}` frame per line.

use crate::ports::transport::StreamTransport;
use crate::receiver::framing::chunked_frames;
use crate::receiver::state::ReceiverState;
use crate::receiver::turn::{TurnContext, TurnOutcome, TurnWriter, run_turn};
use murmur_domain::ChunkedRequestBody;
use tokio::sync::watch;

pub struct ChunkedStreamReceiver {
    writer: TurnWriter,
}

impl ChunkedStreamReceiver {
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
        body: &ChunkedRequestBody,
    ) -> TurnOutcome {
        run_turn(
            &mut self.writer,
            transport.open_chunked(body),
            chunked_frames,
        )
        .await
    }
}
