//! HTTP adapters for the stream transport port.

mod token;
mod transport;

pub use token::EnvTokenProvider;
pub use transport::HttpStreamTransport;
