//! Markdown rendering for assistant replies.
//!
//! Uses comrak for CommonMark parsing. Raw HTML in the source is escaped,
//! never passed through, so streamed server text cannot inject markup.

use comrak::{Options, markdown_to_html};
use murmur_domain::ContentRenderer;

/// Renders message content as sanitized HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn render_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.r#unsafe = false; // Don't allow raw HTML
    options.render.escape = true;
    options.render.hardbreaks = true;
    options
}

impl ContentRenderer for MarkdownRenderer {
    fn render(&self, raw: &str) -> String {
        markdown_to_html(raw, &render_options())
    }
}
