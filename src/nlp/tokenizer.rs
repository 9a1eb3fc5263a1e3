//! Unicode-aware tokenization
//!
//! This module provides UAX #29 word segmentation that keeps every byte of
//! the input: words and punctuation become tokens, whitespace is attached to
//! the preceding token, so the original string can always be rebuilt.

use crate::errors::{BiasError, Result};
use crate::nlp::text::{TextProcessor, TextRepresentation};
use crate::types::Token;
use unicode_segmentation::UnicodeSegmentation;

/// A Unicode-aware tokenizer following UAX #29
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    /// Texts longer than this many bytes are rejected
    max_text_bytes: Option<usize>,
}

impl Tokenizer {
    /// Create a new tokenizer with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject texts longer than `max_bytes`
    pub fn with_max_text_bytes(mut self, max_bytes: usize) -> Self {
        self.max_text_bytes = Some(max_bytes);
        self
    }

    /// Tokenize text into a whitespace-preserving token sequence
    ///
    /// Leading whitespace becomes a whitespace-only token so that the
    /// reconstruction invariant holds for every input.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();

        let body = text.trim_start();
        let offset = text.len() - body.len();
        if offset > 0 {
            let leading = &text[..offset];
            tokens.push(Token::new(leading, "", leading, 0, 0));
        }

        for (seg_start, segment) in body.split_word_bound_indices() {
            let abs_start = offset + seg_start;

            if segment.chars().all(char::is_whitespace) {
                // Always preceded by a token: `body` starts with non-whitespace.
                if let Some(prev) = tokens.last_mut() {
                    prev.whitespace.push_str(segment);
                }
                continue;
            }

            let lemma = self.basic_lemmatize(segment);
            let index = tokens.len();
            tokens.push(Token::new(segment, "", lemma, abs_start, index));
        }

        tokens
    }

    /// Tokenize and wrap the result as a [`TextRepresentation`]
    pub fn represent(&self, id: usize, text: &str) -> Result<TextRepresentation> {
        if let Some(max) = self.max_text_bytes {
            if text.len() > max {
                return Err(BiasError::tokenization(format!(
                    "text {} is {} bytes, exceeding the {} byte limit",
                    id,
                    text.len(),
                    max
                )));
            }
        }
        Ok(TextRepresentation::new(id, text, self.tokenize(text)))
    }

    /// Basic lemmatization (for when no linguistic pipeline is available)
    ///
    /// Handles simple English plural and verb suffixes. Short words and
    /// words containing apostrophes are only lower-cased.
    fn basic_lemmatize(&self, word: &str) -> String {
        let lower = word.to_lowercase();

        if lower.chars().count() <= 3 || lower.contains(['\'', '\u{2019}']) {
            return lower;
        }
        if !lower.chars().all(char::is_alphabetic) {
            return lower;
        }

        if lower.ends_with("ies") && lower.len() > 4 {
            return format!("{}y", &lower[..lower.len() - 3]);
        }
        if lower.ends_with("es") && lower.len() > 3 {
            let stem = &lower[..lower.len() - 2];
            if stem.ends_with("ss")
                || stem.ends_with("sh")
                || stem.ends_with("ch")
                || stem.ends_with('x')
                || stem.ends_with('o')
            {
                return stem.to_string();
            }
        }
        if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") {
            return lower[..lower.len() - 1].to_string();
        }
        if lower.ends_with("ing") && lower.len() > 5 {
            // Doubled consonant (running -> run)
            return undouble(&lower[..lower.len() - 3]).to_string();
        }
        if lower.ends_with("ied") && lower.len() > 4 {
            return format!("{}y", &lower[..lower.len() - 3]);
        }
        if lower.ends_with("ed") && lower.len() > 4 {
            return undouble(&lower[..lower.len() - 2]).to_string();
        }

        lower
    }
}

/// Drop the last char of `stem` when it repeats the one before it.
fn undouble(stem: &str) -> &str {
    let mut rev = stem.char_indices().rev();
    match (rev.next(), rev.next()) {
        (Some((last_at, last)), Some((_, prev))) if last == prev => &stem[..last_at],
        _ => stem,
    }
}

impl TextProcessor for Tokenizer {
    fn process(&self, id: usize, text: &str) -> Result<TextRepresentation> {
        self.represent(id, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(tokens: &[Token]) -> String {
        tokens
            .iter()
            .map(|t| format!("{}{}", t.text, t.whitespace))
            .collect()
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("He is a doctor.");

        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["He", "is", "a", "doctor", "."]);
        assert_eq!(tokens[0].whitespace, " ");
        assert_eq!(tokens[3].whitespace, "");
        assert_eq!(tokens[3].start, 8);
        assert!(tokens.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_reconstruction_with_irregular_whitespace() {
        let tokenizer = Tokenizer::new();
        for text in [
            "  leading and trailing  ",
            "tabs\tand\nnewlines\r\n",
            "She said:  \"no!\"",
            "Café résumé naïve. 日本語テスト。",
            "Hello 👋 world! How are you? 🎉",
            "   ",
        ] {
            assert_eq!(reconstruct(&tokenizer.tokenize(text)), text);
        }
    }

    #[test]
    fn test_leading_whitespace_token() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("  she");
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_space());
        assert_eq!(tokens[1].text, "she");
        assert_eq!(tokens[1].start, 2);
    }

    #[test]
    fn test_basic_lemmatization() {
        let tokenizer = Tokenizer::new();

        assert_eq!(tokenizer.basic_lemmatize("running"), "run");
        assert_eq!(tokenizer.basic_lemmatize("Doctors"), "doctor");
        assert_eq!(tokenizer.basic_lemmatize("studies"), "study");
        assert_eq!(tokenizer.basic_lemmatize("boxes"), "box");
        assert_eq!(tokenizer.basic_lemmatize("his"), "his");
        assert_eq!(tokenizer.basic_lemmatize("Jesus"), "jesus");
        assert_eq!(tokenizer.basic_lemmatize("woman's"), "woman's");
    }

    #[test]
    fn test_lemmatization_of_non_ascii_doubled_letters() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.basic_lemmatize("aééing"), "aé");
        assert_eq!(tokenizer.basic_lemmatize("naïïed"), "naï");
        assert_eq!(tokenizer.basic_lemmatize("ЖЖЖing"), "жж");

        let tokens = tokenizer.tokenize("Il a dit aééing hier.");
        assert_eq!(tokens[3].text, "aééing");
        assert_eq!(tokens[3].lemma, "aé");
    }

    #[test]
    fn test_empty_input() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.tokenize("").is_empty());
        let repr = tokenizer.represent(0, "").unwrap();
        assert!(repr.is_empty());
    }

    #[test]
    fn test_max_text_bytes() {
        let tokenizer = Tokenizer::new().with_max_text_bytes(5);
        assert!(tokenizer.represent(0, "short").is_ok());
        let err = tokenizer.represent(1, "too long").unwrap_err();
        assert!(matches!(err, BiasError::Tokenization { .. }));
    }
}
