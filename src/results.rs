//! Detection results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::{DeltaStats, PairStats};
use crate::counterfactual::CounterfactualSample;
use crate::errors::{BiasError, Result};
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::StageFailure;
use crate::types::Label;

/// Bias statistics for one concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptResult {
    pub concept: String,
    /// Every generated sample, scored or failed
    pub samples: Vec<CounterfactualSample>,
    /// Substitute keyword → delta statistics
    pub keyword_stats: BTreeMap<String, DeltaStats>,
    /// Per `(original, substitute)` pair, sorted by pair
    pub pair_stats: Vec<PairStats>,
    /// All scored deltas of the concept
    pub overall: DeltaStats,
    /// Keywords with too few scored samples to count toward the headline
    pub omitted_keywords: Vec<String>,
    /// Largest absolute mean delta over significant keywords
    pub max_mean: Option<f64>,
    /// Largest delta standard deviation over significant keywords
    pub max_std: Option<f64>,
    pub failed_samples: usize,
    /// Why the statistics are empty, when they are
    pub note: Option<String>,
}

impl ConceptResult {
    pub fn scored_samples(&self) -> usize {
        self.overall.count
    }

    pub fn summary(&self) -> ConceptSummary {
        ConceptSummary {
            concept: self.concept.clone(),
            max_mean: self.max_mean,
            max_std: self.max_std,
            samples: self.samples.len(),
            scored: self.overall.count,
            failed: self.failed_samples,
            omitted_keywords: self.omitted_keywords.len(),
        }
    }
}

/// Headline numbers of a [`ConceptResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub concept: String,
    pub max_mean: Option<f64>,
    pub max_std: Option<f64>,
    pub samples: usize,
    pub scored: usize,
    pub failed: usize,
    pub omitted_keywords: usize,
}

impl fmt::Display for ConceptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.max_mean, self.max_std) {
            (Some(mean), Some(std)) => write!(
                f,
                "Concept: {}\t\tMax-Mean Counterfactual Score: {:.5}\t\tMax-Std Counterfactual Score: {:.5}",
                self.concept, mean, std
            ),
            _ => write!(
                f,
                "Concept: {}\t\tinsufficient data ({} of {} samples scored)",
                self.concept, self.scored, self.samples
            ),
        }
    }
}

/// A text that was left out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedText {
    pub text_id: usize,
    pub failure: StageFailure,
}

/// Output of a full detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub concept_results: BTreeMap<String, ConceptResult>,
    pub texts: Vec<String>,
    pub labels: Option<Vec<Label>>,
    pub skipped_texts: Vec<SkippedText>,
}

impl DetectionResult {
    pub fn concept(&self, name: &str) -> Option<&ConceptResult> {
        self.concept_results.get(name)
    }

    /// The samples generated for `concept`.
    pub fn samples_for(&self, concept: &str) -> Result<&[CounterfactualSample]> {
        self.concept_results
            .get(concept)
            .map(|r| r.samples.as_slice())
            .ok_or_else(|| {
                BiasError::config(
                    ErrorCode::UnknownConcept,
                    format!("/concepts/{concept}"),
                    format!("concept '{concept}' not found in results"),
                )
            })
    }

    /// One summary per concept, in concept-name order.
    pub fn summaries(&self) -> Vec<ConceptSummary> {
        self.concept_results.values().map(ConceptResult::summary).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for summary in self.summaries() {
            writeln!(f, "{summary}")?;
        }
        if !self.skipped_texts.is_empty() {
            writeln!(f, "Skipped texts: {}", self.skipped_texts.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::concepts::Concept;
    use crate::counterfactual::SampleScore;

    fn result() -> DetectionResult {
        let gender = Concept::from_words("gender", ["he", "she"]);
        let sample = CounterfactualSample {
            text: "She is here.".to_string(),
            source_id: 0,
            concept: "gender".to_string(),
            orig_keyword: "he".to_string(),
            keyword: "she".to_string(),
            label: Some(Label::Int(1)),
            source_span: (0, 2),
            replacement_span: (0, 3),
            score: SampleScore::Scored(0.25),
        };
        let religion = Concept::from_words("religion", ["muslim", "christian"]);

        let mut concept_results = BTreeMap::new();
        concept_results.insert("gender".to_string(), aggregate(vec![sample], &gender, 1));
        concept_results.insert("religion".to_string(), aggregate(Vec::new(), &religion, 1));
        DetectionResult {
            concept_results,
            texts: vec!["He is here.".to_string()],
            labels: Some(vec![Label::Int(1)]),
            skipped_texts: Vec::new(),
        }
    }

    #[test]
    fn test_samples_for() {
        let result = result();
        assert_eq!(result.samples_for("gender").unwrap().len(), 1);
        assert!(result.samples_for("religion").unwrap().is_empty());
        let err = result.samples_for("age").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnknownConcept));
    }

    #[test]
    fn test_display() {
        let report = result().to_string();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Concept: gender\t\tMax-Mean Counterfactual Score: 0.25000\t\tMax-Std Counterfactual Score: 0.00000"
        );
        assert!(lines[1].contains("insufficient data (0 of 0 samples scored)"));
    }

    #[test]
    fn test_json_roundtrip() {
        let result = result();
        let json = result.to_json().unwrap();
        assert!(json.contains("\"max_mean\": 0.25"));
        assert_eq!(DetectionResult::from_json(&json).unwrap(), result);
    }
}
