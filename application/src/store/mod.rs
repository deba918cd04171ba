//! Message timeline state.
//!
//! [`MessageStore`] is the single source of truth for rendering one
//! session. It is a plain state container: orchestration lives in
//! [`SessionController`](crate::use_cases::session_controller::SessionController).

pub mod message_store;

pub use message_store::{MessageStore, StoreChange};
