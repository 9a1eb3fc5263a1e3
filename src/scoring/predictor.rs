//! The classifier boundary.

use thiserror::Error;

/// Per-class probabilities (or any per-class score) for one text.
pub type ScoreVector = Vec<f64>;

/// Error reported by a predictor for a whole batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PredictError {
    pub message: String,
}

impl PredictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A text classifier under audit.
///
/// `predict` must return exactly one score vector per input text, in input
/// order. Implementations that keep no mutable state between calls should
/// override [`is_stateless`](Predictor::is_stateless) so batches and concepts
/// may be scored concurrently.
pub trait Predictor: Sync {
    fn predict(&self, batch: &[&str]) -> Result<Vec<ScoreVector>, PredictError>;

    fn is_stateless(&self) -> bool {
        false
    }
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, batch: &[&str]) -> Result<Vec<ScoreVector>, PredictError> {
        (**self).predict(batch)
    }

    fn is_stateless(&self) -> bool {
        (**self).is_stateless()
    }
}

/// Adapts a closure into a [`Predictor`].
///
/// ```
/// use rapid_counterfactual::scoring::{FnPredictor, Predictor};
///
/// let model = FnPredictor::new(|batch: &[&str]| {
///     Ok(batch.iter().map(|t| vec![0.5, t.len() as f64 / 100.0]).collect())
/// })
/// .stateless();
/// assert!(model.is_stateless());
/// assert_eq!(model.predict(&["abc"]).unwrap()[0][1], 0.03);
/// ```
#[derive(Debug, Clone)]
pub struct FnPredictor<F> {
    func: F,
    stateless: bool,
}

impl<F> FnPredictor<F>
where
    F: Fn(&[&str]) -> Result<Vec<ScoreVector>, PredictError> + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            stateless: false,
        }
    }

    /// Declare that the closure may be called concurrently.
    pub fn stateless(mut self) -> Self {
        self.stateless = true;
        self
    }
}

impl<F> Predictor for FnPredictor<F>
where
    F: Fn(&[&str]) -> Result<Vec<ScoreVector>, PredictError> + Sync,
{
    fn predict(&self, batch: &[&str]) -> Result<Vec<ScoreVector>, PredictError> {
        (self.func)(batch)
    }

    fn is_stateless(&self) -> bool {
        self.stateless
    }
}
