//! Text representation and tokenization
//!
//! - [`text`]: the [`TextRepresentation`](text::TextRepresentation) token
//!   sequence and the [`TextProcessor`](text::TextProcessor) seam for
//!   plugging in an external linguistic pipeline
//! - [`tokenizer`]: the built-in UAX #29 tokenizer

pub mod text;
pub mod tokenizer;

pub use text::{TextProcessor, TextRepresentation};
pub use tokenizer::Tokenizer;
