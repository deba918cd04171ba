//! Content renderers for message display.

mod markdown;

pub use markdown::MarkdownRenderer;
