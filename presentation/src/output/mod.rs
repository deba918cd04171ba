//! Terminal output: transcript formatting and live turn printing.

pub mod console;
pub mod stream;
