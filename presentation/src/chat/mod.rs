//! Interactive chat module
//!
//! Provides a line-editor based chat interface over a [`SessionController`].
//!
//! [`SessionController`]: murmur_application::SessionController

mod repl;

pub use repl::{ChatRepl, DeviceFactory, ReplCommand};
