//! Counterfactual text generation.
//!
//! Every keyword occurrence is swapped independently: one occurrence, one
//! substitute, one sample. The number of candidates per text is therefore
//! `occurrences × (concept size − 1)` at most, never the cross product of
//! all occurrences.
//!
//! Budgets are enforced by uniform random subsampling with an RNG derived
//! from the configured seed and the concept name (plus the text id for the
//! per-text cap), so runs are reproducible and independent of the order in
//! which concepts are processed.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHasher;

use super::case::CasePattern;
use super::sample::{CounterfactualSample, SampleScore};
use crate::concepts::{Concept, KeywordOccurrence, TextMatches};
use crate::nlp::text::TextRepresentation;
use crate::types::{DetectorConfig, Label};

/// Generates counterfactual samples for one concept at a time.
#[derive(Debug, Clone)]
pub struct CounterfactualGenerator {
    respect_function: bool,
    max_samples: Option<usize>,
    max_samples_per_text: Option<usize>,
    seed: u64,
}

impl Default for CounterfactualGenerator {
    fn default() -> Self {
        Self {
            respect_function: true,
            max_samples: None,
            max_samples_per_text: None,
            seed: 42,
        }
    }
}

impl CounterfactualGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            respect_function: config.respect_function,
            max_samples: config.max_counterfactual_samples,
            max_samples_per_text: config.max_counterfactual_samples_per_text,
            seed: config.seed,
        }
    }

    pub fn with_respect_function(mut self, respect: bool) -> Self {
        self.respect_function = respect;
        self
    }

    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.max_samples = Some(max);
        self
    }

    pub fn with_max_samples_per_text(mut self, max: usize) -> Self {
        self.max_samples_per_text = Some(max);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Every counterfactual for the given occurrences, in occurrence order
    /// then keyword order.
    pub fn candidates(
        &self,
        text: &TextRepresentation,
        occurrences: &[KeywordOccurrence],
        concept: &Concept,
    ) -> Vec<CounterfactualSample> {
        let mut samples = Vec::new();

        for occ in occurrences {
            let Some(matched) = concept.keyword(occ.keyword_idx) else {
                continue;
            };
            let Some((from, to)) = text.byte_span(occ.start_token, occ.end_token) else {
                continue;
            };
            let Some(surface) = text.text.get(from..to) else {
                continue;
            };
            let pattern = CasePattern::detect(surface);
            let matched_key = matched.key();

            for (idx, candidate) in concept.keywords().iter().enumerate() {
                if idx == occ.keyword_idx || candidate.key() == matched_key {
                    continue;
                }
                if self.respect_function && !matched.shares_function(candidate) {
                    continue;
                }
                let replacement = pattern.apply(&candidate.text);
                if replacement == surface {
                    continue;
                }

                let mut generated =
                    String::with_capacity(text.text.len() - surface.len() + replacement.len());
                generated.push_str(&text.text[..from]);
                generated.push_str(&replacement);
                generated.push_str(&text.text[to..]);

                samples.push(CounterfactualSample {
                    text: generated,
                    source_id: text.id,
                    concept: concept.name.clone(),
                    orig_keyword: matched.text.clone(),
                    keyword: candidate.text.clone(),
                    label: None,
                    source_span: (from, to),
                    replacement_span: (from, from + replacement.len()),
                    score: SampleScore::Pending,
                });
            }
        }

        samples
    }

    /// Counterfactuals for one text, subsampled to `max_samples` if given.
    pub fn generate(
        &self,
        text: &TextRepresentation,
        occurrences: &[KeywordOccurrence],
        concept: &Concept,
        max_samples: Option<usize>,
    ) -> Vec<CounterfactualSample> {
        let samples = self.candidates(text, occurrences, concept);
        match max_samples {
            Some(budget) if samples.len() > budget => {
                let mut rng = self.rng(&concept.name, Some(text.id));
                subsample(samples, budget, &mut rng)
            }
            _ => samples,
        }
    }

    /// Counterfactuals for a concept across a corpus.
    ///
    /// `texts` must be sorted by id (as produced by the tokenization stage);
    /// `matches` come from the detector. Applies the per-text cap first and
    /// then the concept-wide budget.
    pub fn generate_corpus(
        &self,
        texts: &[TextRepresentation],
        matches: &[TextMatches],
        concept: &Concept,
        labels: Option<&[Label]>,
    ) -> Vec<CounterfactualSample> {
        let mut samples = Vec::new();

        for text_matches in matches {
            let occurrences = text_matches.occurrences(&concept.name);
            if occurrences.is_empty() {
                continue;
            }
            let Ok(pos) = texts.binary_search_by_key(&text_matches.text_id, |t| t.id) else {
                continue;
            };
            let text = &texts[pos];
            let label = labels.and_then(|l| l.get(text.id));

            for mut sample in self.generate(text, occurrences, concept, self.max_samples_per_text) {
                sample.label = label.cloned();
                samples.push(sample);
            }
        }

        match self.max_samples {
            Some(budget) if samples.len() > budget => {
                let mut rng = self.rng(&concept.name, None);
                subsample(samples, budget, &mut rng)
            }
            _ => samples,
        }
    }

    fn rng(&self, concept: &str, text_id: Option<usize>) -> StdRng {
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.seed);
        hasher.write(concept.as_bytes());
        if let Some(id) = text_id {
            hasher.write_usize(id);
        }
        StdRng::seed_from_u64(hasher.finish())
    }
}

/// Keep a uniform random subset of `budget` items, preserving order.
fn subsample<T>(items: Vec<T>, budget: usize, rng: &mut StdRng) -> Vec<T> {
    if items.len() <= budget {
        return items;
    }
    let mut keep = vec![false; items.len()];
    for idx in rand::seq::index::sample(rng, items.len(), budget) {
        keep[idx] = true;
    }
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .collect()
}
