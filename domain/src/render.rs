//! Rendering of raw message content into displayable markup.

/// Converts raw message text into sanitized markup.
///
/// Implementations must never pass raw HTML from the input through
/// unescaped. Called on every patch, so partial input (an unterminated
/// code fence, half a link) must render without error.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, raw: &str) -> String;
}

/// Escapes HTML and turns newlines into `<br>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl ContentRenderer for PlainTextRenderer {
    fn render(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                '\n' => out.push_str("<br>"),
                '\r' => {}
                _ => out.push(ch),
            }
        }
        out
    }
}
