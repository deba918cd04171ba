//! Live printing of an in-flight turn
//!
//! [`StreamPrinter`] follows one message in the [`MessageStore`] and writes
//! each content delta as it lands. Server status text is shown as a dimmed
//! line until the first text arrives.

use colored::Colorize;
use murmur_application::{MessageStore, SessionController, StoreChange, TurnHandle, TurnOutcome};
use murmur_domain::{ChatMessage, MessageId, StreamingState};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing::debug;

/// Writes store updates for a followed message to `W`.
pub struct StreamPrinter<W: Write> {
    store: Arc<MessageStore>,
    changes: Receiver<StoreChange>,
    out: W,
    quiet: bool,
    /// Message being followed and how many bytes of it were written.
    cursor: Option<(MessageId, usize)>,
}

impl<W: Write> StreamPrinter<W> {
    /// Subscribe to `store`. Changes published before this call are
    /// recovered from the store itself when following.
    pub fn new(store: Arc<MessageStore>, out: W) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            changes,
            out,
            quiet: false,
            cursor: None,
        }
    }

    /// Suppress status lines.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print `id` until it reaches a terminal state.
    ///
    /// Cancel-safe: dropping the future and calling `follow` again for the
    /// same message resumes after the last written byte.
    pub async fn follow(&mut self, id: &MessageId) -> io::Result<Option<Arc<ChatMessage>>> {
        if self.cursor.as_ref().is_none_or(|(current, _)| current != id) {
            self.cursor = Some((id.clone(), 0));
        }

        if let Some(message) = self.store.get(id)
            && self.render(&message)?
        {
            return Ok(Some(message));
        }

        loop {
            match self.changes.recv().await {
                Ok(StoreChange::Status { id: target, content }) if &target == id => {
                    self.status(&content)?;
                }
                Ok(change) => {
                    if let Some(message) = change.message()
                        && &message.id == id
                        && self.render(message)?
                    {
                        return Ok(Some(message.clone()));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Printer lagged by {} changes, resyncing", skipped);
                    if let Some(message) = self.store.get(id)
                        && self.render(&message)?
                    {
                        return Ok(Some(message));
                    }
                }
                Err(RecvError::Closed) => return Ok(self.store.get(id)),
            }
        }
    }

    fn written(&self) -> usize {
        self.cursor.as_ref().map_or(0, |(_, written)| *written)
    }

    /// Write the unseen tail of `message`. Returns true once it is terminal.
    fn render(&mut self, message: &ChatMessage) -> io::Result<bool> {
        let written = self.written();
        if let Some(delta) = message.content.get(written..)
            && !delta.is_empty()
        {
            self.out.write_all(delta.as_bytes())?;
            self.out.flush()?;
            self.cursor = Some((message.id.clone(), message.content.len()));
        }

        if !message.state.is_terminal() {
            return Ok(false);
        }

        if self.written() > 0 {
            writeln!(self.out)?;
        }
        if message.state == StreamingState::Errored {
            let reason = message.error.as_deref().unwrap_or("Unknown error");
            writeln!(self.out, "{} {}", "error:".red().bold(), reason.red())?;
        }
        self.out.flush()?;
        Ok(true)
    }

    fn status(&mut self, content: &str) -> io::Result<()> {
        if self.quiet || self.written() > 0 {
            return Ok(());
        }
        writeln!(self.out, "{}", format!("… {}", content).dimmed())?;
        self.out.flush()
    }
}

/// Print a turn to completion. Ctrl+C cancels the turn and keeps what
/// arrived so far.
pub async fn follow_turn<W: Write>(
    controller: &SessionController,
    printer: &mut StreamPrinter<W>,
    handle: TurnHandle,
) -> io::Result<TurnOutcome> {
    let id = handle.message_id().clone();

    tokio::select! {
        result = printer.follow(&id) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            controller.cancel();
            printer.follow(&id).await?;
        }
    }

    Ok(handle.wait().await)
}
