//! Keyword-based concept detection.
//!
//! Each concept's keyword forms are indexed by their first word segment so a
//! text is scanned once per concept with a hash lookup per token. Matching is
//! exact on the token's lower-cased surface or lemma; a keyword is never
//! found inside an unrelated word.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::concept::{form_parts, Concept};
use crate::nlp::text::TextRepresentation;
use crate::types::Token;

/// One matched keyword occurrence inside a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordOccurrence {
    /// Index of the matched keyword within its concept
    pub keyword_idx: usize,
    /// Canonical text of the matched keyword
    pub keyword: String,
    /// First matched token (inclusive)
    pub start_token: usize,
    /// Last matched token (exclusive)
    pub end_token: usize,
}

/// All concept matches for one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatches {
    pub text_id: usize,
    /// Concept name → occurrences in document order
    pub concepts: BTreeMap<String, Vec<KeywordOccurrence>>,
}

impl TextMatches {
    pub fn occurrences(&self, concept: &str) -> &[KeywordOccurrence] {
        self.concepts
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// First-segment index over a concept's keyword forms.
#[derive(Debug, Clone)]
struct KeywordIndex {
    by_first: FxHashMap<String, Vec<(usize, Vec<String>)>>,
}

impl KeywordIndex {
    fn build(concept: &Concept) -> Self {
        let mut by_first: FxHashMap<String, Vec<(usize, Vec<String>)>> = FxHashMap::default();
        for (idx, keyword) in concept.keywords().iter().enumerate() {
            for form in keyword.forms() {
                let parts = form_parts(&form);
                let Some(first) = parts.first().cloned() else {
                    continue;
                };
                let entries = by_first.entry(first).or_default();
                if !entries.iter().any(|(i, p)| *i == idx && *p == parts) {
                    entries.push((idx, parts));
                }
            }
        }
        Self { by_first }
    }

    /// Longest keyword match starting at `pos`: `(keyword_idx, token_len)`.
    ///
    /// Surface matches are tried before lemma matches; among equally long
    /// matches the earlier keyword wins.
    fn longest_at(&self, tokens: &[Token], pos: usize) -> Option<(usize, usize)> {
        let token = &tokens[pos];
        let mut best: Option<(usize, usize)> = None;

        let lemma = (token.lemma != token.lower).then_some(&token.lemma);

        for key in std::iter::once(&token.lower).chain(lemma) {
            let Some(candidates) = self.by_first.get(key.as_str()) else {
                continue;
            };
            for (keyword_idx, parts) in candidates {
                let longer = best.map_or(true, |(_, len)| parts.len() > len);
                if longer && matches_parts(tokens, pos, parts) {
                    best = Some((*keyword_idx, parts.len()));
                }
            }
        }

        best
    }
}

fn matches_parts(tokens: &[Token], pos: usize, parts: &[String]) -> bool {
    if pos + parts.len() > tokens.len() {
        return false;
    }
    parts
        .iter()
        .zip(&tokens[pos..pos + parts.len()])
        .all(|(part, token)| token.matches_form(part))
}

/// Scans texts for keywords of a fixed set of concepts.
#[derive(Debug, Clone)]
pub struct ConceptDetector<'a> {
    concepts: Vec<(&'a Concept, KeywordIndex)>,
}

impl<'a> ConceptDetector<'a> {
    pub fn new(concepts: &[&'a Concept]) -> Self {
        Self {
            concepts: concepts
                .iter()
                .map(|concept| (*concept, KeywordIndex::build(concept)))
                .collect(),
        }
    }

    /// Occurrences of one concept in a text; non-overlapping, left to right.
    fn scan(&self, index: &KeywordIndex, concept: &Concept, text: &TextRepresentation) -> Vec<KeywordOccurrence> {
        let tokens = &text.tokens;
        let mut occurrences = Vec::new();
        let mut pos = 0;

        while pos < tokens.len() {
            if tokens[pos].is_space() {
                pos += 1;
                continue;
            }
            match index.longest_at(tokens, pos) {
                Some((keyword_idx, len)) => {
                    let keyword = concept
                        .keyword(keyword_idx)
                        .map(|k| k.text.clone())
                        .unwrap_or_default();
                    occurrences.push(KeywordOccurrence {
                        keyword_idx,
                        keyword,
                        start_token: pos,
                        end_token: pos + len,
                    });
                    pos += len;
                }
                None => pos += 1,
            }
        }

        occurrences
    }

    /// Match one text against every concept. `None` when nothing matched.
    pub fn detect_one(&self, text: &TextRepresentation) -> Option<TextMatches> {
        let mut concepts = BTreeMap::new();
        for (concept, index) in &self.concepts {
            let occurrences = self.scan(index, concept, text);
            if !occurrences.is_empty() {
                concepts.insert(concept.name.clone(), occurrences);
            }
        }
        if concepts.is_empty() {
            return None;
        }
        Some(TextMatches {
            text_id: text.id,
            concepts,
        })
    }

    /// Match a corpus. Texts without any match are dropped; the output is
    /// ordered by text id.
    pub fn detect(&self, texts: &[TextRepresentation]) -> Vec<TextMatches> {
        let mut matches: Vec<TextMatches> =
            texts.iter().filter_map(|t| self.detect_one(t)).collect();
        matches.sort_by_key(|m| m.text_id);
        matches
    }

    /// Parallel variant of [`detect`](Self::detect) with identical output.
    pub fn detect_par(&self, texts: &[TextRepresentation]) -> Vec<TextMatches> {
        let mut matches: Vec<TextMatches> = texts
            .par_iter()
            .filter_map(|t| self.detect_one(t))
            .collect();
        matches.sort_by_key(|m| m.text_id);
        matches
    }
}

/// Detect concept keywords in a corpus.
pub fn detect(texts: &[TextRepresentation], concepts: &[&Concept]) -> Vec<TextMatches> {
    ConceptDetector::new(concepts).detect(texts)
}
