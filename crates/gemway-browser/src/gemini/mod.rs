//! text/gemini document model.

pub mod parser;

pub use parser::{Document, GemtextBlock};
