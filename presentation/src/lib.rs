//! Presentation layer for murmur
//!
//! This crate contains CLI definitions, console formatting, live turn
//! printing and the interactive chat interface.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::{ChatRepl, DeviceFactory, ReplCommand};
pub use cli::commands::{Cli, OutputFormat, TransportArg};
pub use output::console::ConsoleFormatter;
pub use output::stream::{StreamPrinter, follow_turn};
