//! Counterfactual samples.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::errors::StageFailure;
use crate::types::Label;

/// Scoring state of a sample.
///
/// Starts as `Pending` and is set exactly once by the scoring engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SampleScore {
    #[default]
    Pending,
    /// Score delta between the counterfactual and its source text
    Scored(f64),
    /// The sample could not be scored and is excluded from aggregation
    Failed(StageFailure),
}

/// A source text with one keyword occurrence swapped for another keyword of
/// the same concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualSample {
    /// The generated text
    pub text: String,
    /// Corpus position of the source text
    pub source_id: usize,
    /// Concept the swapped keywords belong to
    pub concept: String,
    /// Canonical text of the keyword found in the source
    pub orig_keyword: String,
    /// Canonical text of the keyword inserted
    pub keyword: String,
    /// Ground-truth label of the source text, if supplied
    pub label: Option<Label>,
    /// Byte range replaced in the source text
    pub source_span: (usize, usize),
    /// Byte range of the inserted text in `text`
    pub replacement_span: (usize, usize),
    pub score: SampleScore,
}

impl CounterfactualSample {
    /// The score delta, if the sample was scored successfully.
    pub fn delta(&self) -> Option<f64> {
        match self.score {
            SampleScore::Scored(delta) => Some(delta),
            _ => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self.score, SampleScore::Scored(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.score, SampleScore::Pending)
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.score {
            SampleScore::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// The inserted surface text.
    pub fn replacement(&self) -> &str {
        let (start, end) = self.replacement_span;
        self.text.get(start..end).unwrap_or("")
    }

    /// Attach a score. Returns `false` (and leaves the sample untouched) if
    /// the sample was already scored or failed.
    pub(crate) fn set_score(&mut self, score: SampleScore) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.score = score;
        true
    }
}

impl fmt::Display for CounterfactualSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "concept={}; keyword={}; text={}",
            self.concept, self.keyword, self.text
        )
    }
}
