//! Tokenized text representation.

use crate::errors::{BiasError, Result};
use crate::types::Token;
use serde::{Deserialize, Serialize};

/// An ordered, immutable token sequence for one input string.
///
/// Invariant: `tokens` concatenated as `text + whitespace` equals `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRepresentation {
    /// Position of the text in the corpus
    pub id: usize,
    /// The original input string
    pub text: String,
    /// Tokens in document order
    pub tokens: Vec<Token>,
}

impl TextRepresentation {
    pub fn new(id: usize, text: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            id,
            text: text.into(),
            tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Rebuild the source string from the tokens.
    pub fn reconstruct(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        for token in &self.tokens {
            out.push_str(&token.text);
            out.push_str(&token.whitespace);
        }
        out
    }

    /// Byte range covered by tokens `start..end`, excluding the trailing
    /// whitespace of the last token.
    pub fn byte_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.tokens.len() {
            return None;
        }
        Some((self.tokens[start].start, self.tokens[end - 1].end()))
    }

    /// Surface text covered by tokens `start..end`.
    pub fn surface(&self, start: usize, end: usize) -> Option<&str> {
        self.byte_span(start, end)
            .and_then(|(from, to)| self.text.get(from..to))
    }
}

impl TextRepresentation {
    /// Check that this representation describes corpus entry `id` with
    /// source `source`: same id and text, lossless reconstruction, and every
    /// token's byte offset pointing at its own surface text.
    pub fn verify(&self, id: usize, source: &str) -> Result<()> {
        if self.id != id {
            return Err(BiasError::tokenization(format!(
                "representation for text {} carries id {}",
                id, self.id
            )));
        }
        if self.text != source {
            return Err(BiasError::tokenization(format!(
                "representation for text {id} does not hold the input text"
            )));
        }
        if self.reconstruct() != source {
            return Err(BiasError::tokenization(format!(
                "tokens of text {id} do not reconstruct the input"
            )));
        }
        for (index, token) in self.tokens.iter().enumerate() {
            if token.index != index {
                return Err(BiasError::tokenization(format!(
                    "token {index} of text {id} carries index {}",
                    token.index
                )));
            }
            if source.get(token.start..token.end()) != Some(token.text.as_str()) {
                return Err(BiasError::tokenization(format!(
                    "token {index} of text {id} has byte offset {} not matching {:?}",
                    token.start, token.text
                )));
            }
        }
        Ok(())
    }
}

/// Turns raw text into a [`TextRepresentation`].
///
/// The built-in [`Tokenizer`](super::Tokenizer) implements this; callers
/// with a full linguistic pipeline (proper lemmatization, language-specific
/// tokenization) provide their own implementation. Implementations must
/// honor the reconstruction invariant and be pure.
pub trait TextProcessor: Send + Sync {
    /// Tokenize one corpus entry. An error skips the text for the run.
    fn process(&self, id: usize, text: &str) -> Result<TextRepresentation>;
}
