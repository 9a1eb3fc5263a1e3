//! Scoring: the predictor boundary, delta policies, and the batched engine.

pub mod delta;
pub mod engine;
pub mod predictor;

pub use delta::{
    AbsoluteClassDifference, ClassDifference, DeltaPolicy, L1Distance, PositiveClassesDifference,
};
pub use engine::{OriginalScores, RowResult, ScoringEngine, ScoringSummary};
pub use predictor::{FnPredictor, PredictError, Predictor, ScoreVector};
