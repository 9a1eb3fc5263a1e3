//! Batched predictor invocation and delta computation.
//!
//! Texts are sent to the predictor in fixed-size batches. A batch that
//! errors, panics, or returns the wrong number of rows fails as a whole and
//! every text in it is marked failed; other batches are unaffected. A row
//! containing a NaN or infinite value fails only its own text.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::delta::{ClassDifference, DeltaPolicy};
use super::predictor::{Predictor, ScoreVector};
use crate::counterfactual::{CounterfactualSample, SampleScore};
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::StageFailure;
use crate::pipeline::observer::{PipelineObserver, STAGE_SCORE, STAGE_SCORE_ORIGINALS};
use crate::types::DetectorConfig;

/// Score row for one text, or why it has none.
pub type RowResult = Result<ScoreVector, StageFailure>;

/// Scores of the original texts, keyed by text id.
#[derive(Debug, Clone, Default)]
pub struct OriginalScores {
    scores: FxHashMap<usize, RowResult>,
}

impl OriginalScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text_id: usize, scores: RowResult) {
        self.scores.insert(text_id, scores);
    }

    pub fn get(&self, text_id: usize) -> Option<&RowResult> {
        self.scores.get(&text_id)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of originals that could not be scored.
    pub fn failed(&self) -> usize {
        self.scores.values().filter(|r| r.is_err()).count()
    }
}

/// Counts from one [`ScoringEngine::score`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringSummary {
    pub scored: usize,
    pub failed: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    batch_size: usize,
    parallel: bool,
    policy: Arc<dyn DeltaPolicy>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            batch_size: 256,
            parallel: false,
            policy: Arc::new(ClassDifference::default()),
        }
    }
}

impl ScoringEngine {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..Self::default()
        }
    }

    pub fn from_config(config: &DetectorConfig, policy: Arc<dyn DeltaPolicy>) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            parallel: config.parallel_batches,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn DeltaPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Allow concurrent batches. Only honored for stateless predictors.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn policy(&self) -> &dyn DeltaPolicy {
        self.policy.as_ref()
    }

    /// Run one batch through the predictor, isolating errors and panics.
    fn run_batch<P>(
        &self,
        predictor: &P,
        batch: &[&str],
        batch_idx: usize,
        stage: &'static str,
    ) -> Result<Vec<ScoreVector>, StageFailure>
    where
        P: Predictor + ?Sized,
    {
        let path = format!("/batches/{batch_idx}");
        let outcome = catch_unwind(AssertUnwindSafe(|| predictor.predict(batch)));

        let rows = match outcome {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => {
                return Err(StageFailure::new(
                    ErrorCode::PredictorFailed,
                    path,
                    stage,
                    err.message,
                ))
            }
            Err(payload) => {
                return Err(StageFailure::new(
                    ErrorCode::PredictorPanicked,
                    path,
                    stage,
                    panic_message("predictor", payload.as_ref()),
                ))
            }
        };

        if rows.len() != batch.len() {
            return Err(StageFailure::new(
                ErrorCode::ShapeMismatch,
                path,
                stage,
                format!("expected {} score rows, got {}", batch.len(), rows.len()),
            )
            .with_hint("the predictor must return one score vector per input text, in order"));
        }
        Ok(rows)
    }

    /// Predict every text, returning one row result per text in input order.
    pub fn predict_all<P, O>(
        &self,
        texts: &[&str],
        predictor: &P,
        stage: &'static str,
        observer: &mut O,
    ) -> Vec<RowResult>
    where
        P: Predictor + ?Sized,
        O: PipelineObserver + ?Sized,
    {
        let total = texts.len().div_ceil(self.batch_size);
        let batch_results: Vec<Result<Vec<ScoreVector>, StageFailure>> =
            if self.parallel && predictor.is_stateless() {
                let results: Vec<_> = texts
                    .par_chunks(self.batch_size)
                    .enumerate()
                    .map(|(idx, batch)| self.run_batch(predictor, batch, idx, stage))
                    .collect();
                for (idx, result) in results.iter().enumerate() {
                    report_batch(observer, stage, result, idx + 1, total);
                }
                results
            } else {
                texts
                    .chunks(self.batch_size)
                    .enumerate()
                    .map(|(idx, batch)| {
                        let result = self.run_batch(predictor, batch, idx, stage);
                        report_batch(&mut *observer, stage, &result, idx + 1, total);
                        result
                    })
                    .collect()
            };

        let mut rows = Vec::with_capacity(texts.len());
        for (batch, result) in texts.chunks(self.batch_size).zip(batch_results) {
            match result {
                Ok(batch_rows) => rows.extend(batch_rows.into_iter().map(Ok)),
                Err(failure) => rows.extend(batch.iter().map(|_| Err(failure.clone()))),
            }
        }

        for (idx, row) in rows.iter_mut().enumerate() {
            if let Ok(values) = row {
                if values.iter().any(|v| !v.is_finite()) {
                    *row = Err(StageFailure::new(
                        ErrorCode::NonFiniteScore,
                        format!("/rows/{idx}"),
                        stage,
                        "predictor returned a NaN or infinite score",
                    ));
                }
            }
        }
        rows
    }

    /// Score the original texts once so every concept can reuse them.
    pub fn score_originals<P, O>(
        &self,
        texts: &[(usize, &str)],
        predictor: &P,
        observer: &mut O,
    ) -> OriginalScores
    where
        P: Predictor + ?Sized,
        O: PipelineObserver + ?Sized,
    {
        let bodies: Vec<&str> = texts.iter().map(|(_, text)| *text).collect();
        let rows = self.predict_all(&bodies, predictor, STAGE_SCORE_ORIGINALS, observer);

        let mut originals = OriginalScores::new();
        for ((id, _), row) in texts.iter().zip(rows) {
            originals.insert(*id, row);
        }
        originals
    }

    /// Predict pending samples and attach their deltas.
    ///
    /// Samples whose original text has no usable score are failed without
    /// being sent to the predictor.
    pub fn score<P, O>(
        &self,
        samples: &mut [CounterfactualSample],
        predictor: &P,
        originals: &OriginalScores,
        observer: &mut O,
    ) -> ScoringSummary
    where
        P: Predictor + ?Sized,
        O: PipelineObserver + ?Sized,
    {
        let mut summary = ScoringSummary::default();
        let mut to_predict = Vec::new();

        for (idx, sample) in samples.iter_mut().enumerate() {
            if !sample.is_pending() {
                continue;
            }
            match originals.get(sample.source_id) {
                Some(Ok(_)) => to_predict.push(idx),
                Some(Err(original)) => {
                    sample.set_score(SampleScore::Failed(StageFailure::new(
                        ErrorCode::OriginalScoreMissing,
                        format!("/texts/{}", sample.source_id),
                        STAGE_SCORE,
                        format!("original text could not be scored: {}", original.message),
                    )));
                }
                None => {
                    sample.set_score(SampleScore::Failed(StageFailure::new(
                        ErrorCode::OriginalScoreMissing,
                        format!("/texts/{}", sample.source_id),
                        STAGE_SCORE,
                        "original text was never scored",
                    )));
                }
            }
        }

        let texts: Vec<&str> = to_predict.iter().map(|&i| samples[i].text.as_str()).collect();

        let mut failed_batch_paths: Vec<String> = Vec::new();
        let rows = self.predict_all(&texts, predictor, STAGE_SCORE, observer);

        for (&idx, row) in to_predict.iter().zip(rows) {
            let sample = &mut samples[idx];
            let score = match row {
                Err(failure) => {
                    if failure.path.starts_with("/batches/") && !failed_batch_paths.contains(&failure.path) {
                        failed_batch_paths.push(failure.path.clone());
                    }
                    SampleScore::Failed(failure)
                }
                Ok(cf) => self.delta_for(idx, sample, &cf, originals),
            };
            sample.set_score(score);
        }

        summary.failed_batches = failed_batch_paths.len();
        for sample in samples.iter() {
            if sample.is_scored() {
                summary.scored += 1;
            } else if sample.failure().is_some() {
                summary.failed += 1;
            }
        }

        #[cfg(feature = "tracing")]
        if summary.failed > 0 {
            tracing::warn!(
                failed = summary.failed,
                failed_batches = summary.failed_batches,
                "some counterfactual samples could not be scored"
            );
        }

        summary
    }

    fn delta_for(
        &self,
        idx: usize,
        sample: &CounterfactualSample,
        counterfactual: &[f64],
        originals: &OriginalScores,
    ) -> SampleScore {
        let Some(Ok(original)) = originals.get(sample.source_id) else {
            return SampleScore::Failed(StageFailure::new(
                ErrorCode::OriginalScoreMissing,
                format!("/texts/{}", sample.source_id),
                STAGE_SCORE,
                "original text was never scored",
            ));
        };
        match self.policy.delta(original, counterfactual) {
            Some(delta) if delta.is_finite() => SampleScore::Scored(delta),
            Some(_) => SampleScore::Failed(StageFailure::new(
                ErrorCode::NonFiniteScore,
                format!("/samples/{idx}"),
                STAGE_SCORE,
                "delta is not finite",
            )),
            None => SampleScore::Failed(
                StageFailure::new(
                    ErrorCode::ShapeMismatch,
                    format!("/samples/{idx}"),
                    STAGE_SCORE,
                    format!(
                        "{} cannot compare score vectors of length {} and {}",
                        self.policy.name(),
                        original.len(),
                        counterfactual.len()
                    ),
                )
                .with_hint("check the class index configured on the delta policy"),
            ),
        }
    }
}

fn report_batch<O>(
    observer: &mut O,
    stage: &'static str,
    result: &Result<Vec<ScoreVector>, StageFailure>,
    done: usize,
    total: usize,
) where
    O: PipelineObserver + ?Sized,
{
    if let Err(failure) = result {
        #[cfg(feature = "tracing")]
        tracing::warn!(code = %failure.code, path = %failure.path, stage, "batch failed: {}", failure.message);
        observer.on_batch_failed(failure);
    }
    observer.on_batch(stage, done, total);
}

/// Render a caught panic payload as `"{subject} panicked: {message}"`.
pub(crate) fn panic_message(subject: &str, payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("{subject} panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("{subject} panicked: {msg}")
    } else {
        format!("{subject} panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::{CollectingObserver, NoopObserver};
    use crate::scoring::delta::L1Distance;
    use crate::scoring::predictor::{FnPredictor, PredictError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(source_id: usize, text: &str) -> CounterfactualSample {
        CounterfactualSample {
            text: text.to_string(),
            source_id,
            concept: "gender".to_string(),
            orig_keyword: "he".to_string(),
            keyword: "she".to_string(),
            label: None,
            source_span: (0, 2),
            replacement_span: (0, 3),
            score: SampleScore::Pending,
        }
    }

    /// Class 1 probability is 0.9 for texts mentioning "she", 0.5 otherwise.
    fn she_model() -> impl Predictor {
        FnPredictor::new(|batch: &[&str]| {
            Ok(batch
                .iter()
                .map(|t| if t.contains("she") { vec![0.1, 0.9] } else { vec![0.5, 0.5] })
                .collect())
        })
        .stateless()
    }

    fn originals_for(ids: &[usize]) -> OriginalScores {
        let mut originals = OriginalScores::new();
        for &id in ids {
            originals.insert(id, Ok(vec![0.5, 0.5]));
        }
        originals
    }

    #[test]
    fn test_score_attaches_deltas() {
        let engine = ScoringEngine::new(2);
        let mut samples = vec![sample(0, "she ran"), sample(1, "they ran"), sample(2, "she sat")];
        let summary = engine.score(&mut samples, &she_model(), &originals_for(&[0, 1, 2]), &mut NoopObserver);

        assert_eq!(summary.scored, 3);
        assert_eq!(summary.failed_batches, 0);
        assert!((samples[0].delta().unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(samples[1].delta(), Some(0.0));
    }

    #[test]
    fn test_failing_batch_is_isolated() {
        let calls = AtomicUsize::new(0);
        let flaky = FnPredictor::new(|batch: &[&str]| {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(PredictError::new("timeout"));
            }
            Ok(vec![vec![0.5, 0.5]; batch.len()])
        });
        let engine = ScoringEngine::new(2);
        let mut samples: Vec<_> = (0..6).map(|i| sample(i, "text")).collect();
        let mut observer = CollectingObserver::new();
        let summary = engine.score(&mut samples, &flaky, &originals_for(&[0, 1, 2, 3, 4, 5]), &mut observer);

        assert_eq!(summary.scored, 4);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_batches, 1);
        let failure = samples[2].failure().unwrap();
        assert_eq!(failure.code, ErrorCode::PredictorFailed);
        assert_eq!(failure.path, "/batches/1");
        assert_eq!(observer.failed_batches().len(), 1);
        assert_eq!(observer.batches().len(), 3);
    }

    #[test]
    fn test_panic_is_caught() {
        let panicking = FnPredictor::new(|batch: &[&str]| {
            if batch.iter().any(|t| t.contains("boom")) {
                panic!("kaboom");
            }
            Ok(vec![vec![0.5, 0.5]; batch.len()])
        });
        let engine = ScoringEngine::new(1);
        let mut samples = vec![sample(0, "fine"), sample(1, "boom")];
        let summary = engine.score(&mut samples, &panicking, &originals_for(&[0, 1]), &mut NoopObserver);

        assert_eq!(summary.scored, 1);
        let failure = samples[1].failure().unwrap();
        assert_eq!(failure.code, ErrorCode::PredictorPanicked);
        assert!(failure.message.contains("kaboom"));
    }

    #[test]
    fn test_wrong_row_count_fails_batch() {
        let short = FnPredictor::new(|_: &[&str]| Ok(vec![vec![0.5, 0.5]]));
        let engine = ScoringEngine::new(3);
        let mut samples: Vec<_> = (0..3).map(|i| sample(i, "x")).collect();
        engine.score(&mut samples, &short, &originals_for(&[0, 1, 2]), &mut NoopObserver);
        assert!(samples
            .iter()
            .all(|s| s.failure().map(|f| f.code) == Some(ErrorCode::ShapeMismatch)));
    }

    #[test]
    fn test_non_finite_fails_only_that_sample() {
        let nan = FnPredictor::new(|batch: &[&str]| {
            Ok(batch
                .iter()
                .map(|t| if *t == "bad" { vec![0.0, f64::NAN] } else { vec![0.5, 0.5] })
                .collect())
        });
        let engine = ScoringEngine::new(10);
        let mut samples = vec![sample(0, "good"), sample(1, "bad")];
        let summary = engine.score(&mut samples, &nan, &originals_for(&[0, 1]), &mut NoopObserver);
        assert_eq!(summary.scored, 1);
        assert_eq!(summary.failed_batches, 0);
        assert_eq!(samples[1].failure().unwrap().code, ErrorCode::NonFiniteScore);
    }

    #[test]
    fn test_missing_class_index() {
        let one_class = FnPredictor::new(|batch: &[&str]| Ok(vec![vec![1.0]; batch.len()]));
        let engine = ScoringEngine::new(4);
        let mut originals = OriginalScores::new();
        originals.insert(0, Ok(vec![1.0]));
        let mut samples = vec![sample(0, "x")];
        engine.score(&mut samples, &one_class, &originals, &mut NoopObserver);
        assert_eq!(samples[0].failure().unwrap().code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn test_failed_original_skips_prediction() {
        let calls = AtomicUsize::new(0);
        let counting = FnPredictor::new(|batch: &[&str]| {
            calls.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(vec![vec![0.5, 0.5]; batch.len()])
        });
        let mut originals = OriginalScores::new();
        originals.insert(
            0,
            Err(StageFailure::new(ErrorCode::PredictorFailed, "/batches/0", STAGE_SCORE_ORIGINALS, "down")),
        );
        let mut samples = vec![sample(0, "x"), sample(7, "y")];
        ScoringEngine::new(8).score(&mut samples, &counting, &originals, &mut NoopObserver);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(samples
            .iter()
            .all(|s| s.failure().map(|f| f.code) == Some(ErrorCode::OriginalScoreMissing)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut seq: Vec<_> = (0..50).map(|i| sample(i, if i % 3 == 0 { "she" } else { "he" })).collect();
        let mut par = seq.clone();
        let ids: Vec<usize> = (0..50).collect();
        let originals = originals_for(&ids);

        ScoringEngine::new(7).score(&mut seq, &she_model(), &originals, &mut NoopObserver);
        ScoringEngine::new(7)
            .with_parallel(true)
            .score(&mut par, &she_model(), &originals, &mut NoopObserver);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_score_originals_and_policy() {
        let engine = ScoringEngine::new(2).with_policy(Arc::new(L1Distance));
        let originals = engine.score_originals(&[(3, "he"), (5, "she")], &she_model(), &mut NoopObserver);
        assert_eq!(originals.len(), 2);
        assert_eq!(originals.failed(), 0);
        assert_eq!(originals.get(5).unwrap().as_ref().unwrap(), &vec![0.1, 0.9]);
        assert_eq!(engine.policy().name(), "l1_distance");

        let mut samples = vec![sample(3, "she")];
        engine.score(&mut samples, &she_model(), &originals, &mut NoopObserver);
        assert!((samples[0].delta().unwrap() - 0.8).abs() < 1e-12);
    }
}
