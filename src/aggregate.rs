//! Aggregation of scored samples into per-concept bias statistics.
//!
//! Deltas are grouped by substitute keyword (the keyword inserted into the
//! text) and by `(original, substitute)` pair. Every reduction sorts its
//! inputs first, so the statistics are bit-identical however the samples
//! were ordered.
//!
//! The headline numbers `max_mean` (largest absolute keyword mean) and
//! `max_std` only consider keywords with at least `min_occurrences` scored
//! samples; rarer keywords are listed in `omitted_keywords`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::concepts::Concept;
use crate::counterfactual::CounterfactualSample;
use crate::results::ConceptResult;

/// Mean and population standard deviation of a group of deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
}

impl DeltaStats {
    pub fn from_deltas(mut deltas: Vec<f64>) -> Self {
        if deltas.is_empty() {
            return Self::default();
        }
        deltas.sort_by(f64::total_cmp);

        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        let mut squares: Vec<f64> = deltas.iter().map(|d| (d - mean) * (d - mean)).collect();
        squares.sort_by(f64::total_cmp);
        let variance = squares.iter().sum::<f64>() / n;

        Self {
            count: deltas.len(),
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Statistics for one `(original, substitute)` keyword pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub orig_keyword: String,
    pub keyword: String,
    pub stats: DeltaStats,
}

/// Builds [`ConceptResult`]s.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    min_occurrences: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self { min_occurrences: 5 }
    }
}

impl Aggregator {
    pub fn new(min_occurrences: usize) -> Self {
        Self { min_occurrences }
    }

    pub fn min_occurrences(&self) -> usize {
        self.min_occurrences
    }

    pub fn aggregate(&self, samples: Vec<CounterfactualSample>, concept: &Concept) -> ConceptResult {
        let mut by_keyword: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut by_pair: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        let mut all = Vec::new();
        let mut failed = 0;

        for sample in &samples {
            match sample.delta() {
                Some(delta) => {
                    by_keyword.entry(sample.keyword.clone()).or_default().push(delta);
                    by_pair
                        .entry((sample.orig_keyword.clone(), sample.keyword.clone()))
                        .or_default()
                        .push(delta);
                    all.push(delta);
                }
                None if sample.failure().is_some() => failed += 1,
                None => {}
            }
        }

        let keyword_stats: BTreeMap<String, DeltaStats> = by_keyword
            .into_iter()
            .map(|(keyword, deltas)| (keyword, DeltaStats::from_deltas(deltas)))
            .collect();

        let pair_stats: Vec<PairStats> = by_pair
            .into_iter()
            .map(|((orig_keyword, keyword), deltas)| PairStats {
                orig_keyword,
                keyword,
                stats: DeltaStats::from_deltas(deltas),
            })
            .collect();

        let omitted_keywords: Vec<String> = concept
            .keywords()
            .iter()
            .filter(|k| {
                keyword_stats
                    .get(&k.text)
                    .map_or(true, |s| s.count < self.min_occurrences)
            })
            .map(|k| k.text.clone())
            .collect();

        let significant = || {
            keyword_stats
                .values()
                .filter(|s| s.count >= self.min_occurrences)
        };
        let max_mean = significant().map(|s| s.mean.abs()).max_by(f64::total_cmp);
        let max_std = significant().map(|s| s.std).max_by(f64::total_cmp);

        let scored = all.len();
        let note = if samples.is_empty() {
            Some("no counterfactual samples (insufficient data)".to_string())
        } else if scored == 0 {
            Some(format!("all {failed} samples failed scoring"))
        } else if max_mean.is_none() {
            Some(format!(
                "no keyword reached {} scored samples (insufficient data)",
                self.min_occurrences
            ))
        } else {
            None
        };

        ConceptResult {
            concept: concept.name.clone(),
            overall: DeltaStats::from_deltas(all),
            samples,
            keyword_stats,
            pair_stats,
            omitted_keywords,
            max_mean,
            max_std,
            failed_samples: failed,
            note,
        }
    }
}

/// Aggregate one concept's samples with the given significance threshold.
pub fn aggregate(
    samples: Vec<CounterfactualSample>,
    concept: &Concept,
    min_occurrences: usize,
) -> ConceptResult {
    Aggregator::new(min_occurrences).aggregate(samples, concept)
}
