//! Detection runner: wires tokenization, detection, generation, scoring and
//! aggregation into one call.
//!
//! Every configuration problem (empty corpus, mismatched labels, unknown
//! concepts, invalid settings) is reported before the predictor is called
//! for the first time. After that the run always completes: unusable texts
//! are skipped and failed predictions are recorded on their samples.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use crate::aggregate::Aggregator;
use crate::concepts::{Concept, ConceptDetector, ConceptRegistry};
use crate::counterfactual::{CounterfactualGenerator, CounterfactualSample};
use crate::errors::{BiasError, Result};
use crate::nlp::text::{TextProcessor, TextRepresentation};
use crate::nlp::tokenizer::Tokenizer;
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::StageFailure;
use crate::pipeline::observer::{
    CollectingObserver, NoopObserver, PipelineObserver, StageClock, StageReportBuilder,
    STAGE_AGGREGATE, STAGE_DETECT, STAGE_GENERATE, STAGE_SCORE, STAGE_SCORE_ORIGINALS,
    STAGE_TOKENIZE,
};
use crate::results::{ConceptResult, DetectionResult, SkippedText};
use crate::scoring::engine::panic_message;
use crate::scoring::{ClassDifference, DeltaPolicy, OriginalScores, Predictor, ScoringEngine};
use crate::types::{Corpus, DetectorConfig};

// ---------------------------------------------------------------------------
// Conditional tracing support
// ---------------------------------------------------------------------------

/// Enter a tracing span for a pipeline stage (when the `tracing` feature is
/// enabled). When disabled, this is a no-op and the compiler eliminates it.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("pipeline_stage", stage = $name).entered();
    };
    ($name:expr, $concept:expr) => {
        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("pipeline_stage", stage = $name, concept = $concept).entered();
    };
}

/// Counterfactual bias detection over a registry of concepts.
///
/// ```
/// use rapid_counterfactual::{Corpus, CounterfactualBiasDetector, DetectorConfig, FnPredictor};
///
/// let detector = CounterfactualBiasDetector::new("en")
///     .unwrap()
///     .with_config(DetectorConfig::default().with_min_keyword_occurrences(1));
/// let corpus = Corpus::new(["He is a doctor.", "She is a nurse."]);
/// let model = FnPredictor::new(|batch: &[&str]| Ok(vec![vec![0.5, 0.5]; batch.len()]));
///
/// let result = detector.process_concepts(&corpus, &model, &["gender"]).unwrap();
/// assert_eq!(result.concept("gender").unwrap().max_mean, Some(0.0));
/// ```
#[derive(Clone)]
pub struct CounterfactualBiasDetector {
    registry: ConceptRegistry,
    config: DetectorConfig,
    processor: Option<Arc<dyn TextProcessor>>,
    delta_policy: Arc<dyn DeltaPolicy>,
}

impl std::fmt::Debug for CounterfactualBiasDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterfactualBiasDetector")
            .field("concepts", &self.registry.names().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("custom_processor", &self.processor.is_some())
            .field("delta_policy", &self.delta_policy.name())
            .finish()
    }
}

impl CounterfactualBiasDetector {
    /// A detector using the built-in concepts for `lang`.
    pub fn new(lang: &str) -> Result<Self> {
        Ok(Self::with_registry(ConceptRegistry::builtin(lang)?))
    }

    /// A detector over a caller-supplied registry.
    pub fn with_registry(registry: ConceptRegistry) -> Self {
        Self {
            registry,
            config: DetectorConfig::default(),
            processor: None,
            delta_policy: Arc::new(ClassDifference::default()),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the built-in tokenizer with a linguistic pipeline.
    pub fn with_text_processor(mut self, processor: Arc<dyn TextProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_delta_policy(mut self, policy: impl DeltaPolicy + 'static) -> Self {
        self.delta_policy = Arc::new(policy);
        self
    }

    /// Add a concept. Fails if one with the same name exists.
    pub fn register_concept(&mut self, concept: Concept) -> Result<()> {
        self.registry.register(concept)
    }

    pub fn registry(&self) -> &ConceptRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection for every registered concept.
    pub fn process<P>(&self, corpus: &Corpus, predictor: &P) -> Result<DetectionResult>
    where
        P: Predictor + ?Sized,
    {
        self.process_with_observer(corpus, predictor, &[] as &[&str], &mut NoopObserver)
    }

    /// Run detection for the named concepts only. An empty list selects all.
    pub fn process_concepts<P, S>(
        &self,
        corpus: &Corpus,
        predictor: &P,
        concepts: &[S],
    ) -> Result<DetectionResult>
    where
        P: Predictor + ?Sized,
        S: AsRef<str>,
    {
        self.process_with_observer(corpus, predictor, concepts, &mut NoopObserver)
    }

    /// Full entry point: selected concepts and an observer for progress.
    pub fn process_with_observer<P, S, O>(
        &self,
        corpus: &Corpus,
        predictor: &P,
        concepts: &[S],
        observer: &mut O,
    ) -> Result<DetectionResult>
    where
        P: Predictor + ?Sized,
        S: AsRef<str>,
        O: PipelineObserver + ?Sized,
    {
        self.config.validate()?;
        corpus.validate()?;
        let selected = self.registry.select(concepts)?;

        let (texts, skipped_texts) = self.tokenize(corpus, observer);

        let matches = {
            trace_stage!(STAGE_DETECT);
            observer.on_stage_start(STAGE_DETECT);
            let clock = StageClock::start();
            let detector = ConceptDetector::new(&selected);
            let matches = self.config.runtime.scoped(|| detector.detect_par(&texts));
            let report = StageReportBuilder::new(clock.elapsed())
                .items(matches.len())
                .build();
            observer.on_stage_end(STAGE_DETECT, &report);
            matches
        };

        // Generate
        let generator = CounterfactualGenerator::from_config(&self.config);
        let labels = corpus.labels.as_deref();
        let mut work: Vec<(&Concept, Vec<CounterfactualSample>)> =
            Vec::with_capacity(selected.len());
        for concept in &selected {
            trace_stage!(STAGE_GENERATE, concept.name.as_str());
            observer.on_stage_start(STAGE_GENERATE);
            let clock = StageClock::start();
            let samples = generator.generate_corpus(&texts, &matches, concept, labels);
            let report = StageReportBuilder::new(clock.elapsed())
                .concept(concept.name.as_str())
                .items(samples.len())
                .build();
            observer.on_stage_end(STAGE_GENERATE, &report);

            #[cfg(feature = "tracing")]
            if samples.is_empty() {
                tracing::warn!(concept = %concept.name, "no counterfactual samples for concept");
            }
            work.push((*concept, samples));
        }

        // Score each source text once, shared by all concepts
        let engine = ScoringEngine::from_config(&self.config, Arc::clone(&self.delta_policy));
        let originals = self.score_originals(corpus, &work, &engine, predictor, observer);

        // Score and aggregate
        let aggregator = Aggregator::new(self.config.min_keyword_occurrences);
        let results: Vec<ConceptResult> = if self.config.parallel_concepts && predictor.is_stateless()
        {
            let outcomes: Vec<(ConceptResult, CollectingObserver)> =
                self.config.runtime.scoped(|| {
                    work.into_par_iter()
                        .map(|(concept, samples)| {
                            let mut local = CollectingObserver::new();
                            let result = score_concept(
                                concept,
                                samples,
                                &engine,
                                &aggregator,
                                predictor,
                                &originals,
                                &mut local,
                            );
                            (result, local)
                        })
                        .collect()
                });
            outcomes
                .into_iter()
                .map(|(result, local)| {
                    local.replay_into(&mut *observer);
                    result
                })
                .collect()
        } else {
            work.into_iter()
                .map(|(concept, samples)| {
                    score_concept(
                        concept,
                        samples,
                        &engine,
                        &aggregator,
                        predictor,
                        &originals,
                        &mut *observer,
                    )
                })
                .collect()
        };

        let concept_results: BTreeMap<String, ConceptResult> = results
            .into_iter()
            .map(|result| (result.concept.clone(), result))
            .collect();

        Ok(DetectionResult {
            concept_results,
            texts: corpus.texts.clone(),
            labels: corpus.labels.clone(),
            skipped_texts,
        })
    }

    fn tokenize<O>(
        &self,
        corpus: &Corpus,
        observer: &mut O,
    ) -> (Vec<TextRepresentation>, Vec<SkippedText>)
    where
        O: PipelineObserver + ?Sized,
    {
        trace_stage!(STAGE_TOKENIZE);
        observer.on_stage_start(STAGE_TOKENIZE);
        let clock = StageClock::start();

        let processor: Arc<dyn TextProcessor> = match &self.processor {
            Some(processor) => Arc::clone(processor),
            None => {
                let mut tokenizer = Tokenizer::new();
                if let Some(max) = self.config.max_text_bytes {
                    tokenizer = tokenizer.with_max_text_bytes(max);
                }
                Arc::new(tokenizer)
            }
        };

        let outcomes: Vec<Result<TextRepresentation>> = self.config.runtime.scoped(|| {
            corpus
                .texts
                .par_iter()
                .enumerate()
                .map(|(id, text)| {
                    catch_unwind(AssertUnwindSafe(|| processor.process(id, text)))
                        .unwrap_or_else(|payload| {
                            Err(BiasError::tokenization(panic_message(
                                "text processor",
                                payload.as_ref(),
                            )))
                        })
                        .and_then(|repr| repr.verify(id, text).map(|()| repr))
                })
                .collect()
        });

        let mut texts = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (id, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(repr) => texts.push(repr),
                Err(err) => {
                    let failure = StageFailure::new(
                        ErrorCode::TokenizationFailed,
                        format!("/texts/{id}"),
                        STAGE_TOKENIZE,
                        err.to_string(),
                    );
                    #[cfg(feature = "tracing")]
                    tracing::warn!(text_id = id, "skipping text: {}", failure.message);
                    observer.on_text_skipped(id, &failure);
                    skipped.push(SkippedText {
                        text_id: id,
                        failure,
                    });
                }
            }
        }

        let report = StageReportBuilder::new(clock.elapsed())
            .items(texts.len())
            .failures(skipped.len())
            .build();
        observer.on_stage_end(STAGE_TOKENIZE, &report);
        (texts, skipped)
    }

    /// Predict every source text that produced at least one sample.
    fn score_originals<P, O>(
        &self,
        corpus: &Corpus,
        work: &[(&Concept, Vec<CounterfactualSample>)],
        engine: &ScoringEngine,
        predictor: &P,
        observer: &mut O,
    ) -> OriginalScores
    where
        P: Predictor + ?Sized,
        O: PipelineObserver + ?Sized,
    {
        trace_stage!(STAGE_SCORE_ORIGINALS);
        observer.on_stage_start(STAGE_SCORE_ORIGINALS);
        let clock = StageClock::start();

        let mut ids: Vec<usize> = work
            .iter()
            .flat_map(|(_, samples)| samples.iter().map(|s| s.source_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let sources: Vec<(usize, &str)> = ids
            .iter()
            .filter_map(|&id| corpus.texts.get(id).map(|text| (id, text.as_str())))
            .collect();
        let originals = engine.score_originals(&sources, predictor, observer);

        let report = StageReportBuilder::new(clock.elapsed())
            .items(originals.len() - originals.failed())
            .failures(originals.failed())
            .build();
        observer.on_stage_end(STAGE_SCORE_ORIGINALS, &report);
        originals
    }
}

fn score_concept<P, O>(
    concept: &Concept,
    mut samples: Vec<CounterfactualSample>,
    engine: &ScoringEngine,
    aggregator: &Aggregator,
    predictor: &P,
    originals: &OriginalScores,
    observer: &mut O,
) -> ConceptResult
where
    P: Predictor + ?Sized,
    O: PipelineObserver + ?Sized,
{
    {
        trace_stage!(STAGE_SCORE, concept.name.as_str());
        observer.on_stage_start(STAGE_SCORE);
        let clock = StageClock::start();
        let summary = engine.score(&mut samples, predictor, originals, observer);
        let report = StageReportBuilder::new(clock.elapsed())
            .concept(concept.name.as_str())
            .items(summary.scored)
            .failures(summary.failed)
            .build();
        observer.on_stage_end(STAGE_SCORE, &report);
    }

    trace_stage!(STAGE_AGGREGATE, concept.name.as_str());
    observer.on_stage_start(STAGE_AGGREGATE);
    let clock = StageClock::start();
    let result = aggregator.aggregate(samples, concept);
    let report = StageReportBuilder::new(clock.elapsed())
        .concept(concept.name.as_str())
        .items(result.keyword_stats.len())
        .build();
    observer.on_stage_end(STAGE_AGGREGATE, &report);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::Keyword;
    use crate::pipeline::observer::ObserverEvent;
    use crate::scoring::FnPredictor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn constant() -> impl Predictor {
        FnPredictor::new(|batch: &[&str]| Ok(vec![vec![0.5, 0.5]; batch.len()])).stateless()
    }

    fn gender_registry() -> ConceptRegistry {
        let mut registry = ConceptRegistry::new();
        registry
            .register(Concept::new(
                "gender",
                [
                    Keyword::new("he").with_functions(["subject"]),
                    Keyword::new("she").with_functions(["subject"]),
                ],
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_stages_reported_in_order() {
        let detector = CounterfactualBiasDetector::with_registry(gender_registry());
        let corpus = Corpus::new(["He is a doctor.", "She is a nurse."]);
        let mut observer = CollectingObserver::new();
        detector
            .process_with_observer(&corpus, &constant(), &[] as &[&str], &mut observer)
            .unwrap();

        assert_eq!(
            observer.started(),
            vec![
                STAGE_TOKENIZE,
                STAGE_DETECT,
                STAGE_GENERATE,
                STAGE_SCORE_ORIGINALS,
                STAGE_SCORE,
                STAGE_AGGREGATE
            ]
        );
    }

    #[test]
    fn test_originals_scored_once() {
        let calls = AtomicUsize::new(0);
        let counting = FnPredictor::new(|batch: &[&str]| {
            calls.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(vec![vec![0.5, 0.5]; batch.len()])
        });
        let mut registry = gender_registry();
        registry
            .register(Concept::from_words("pronoun", ["he", "they"]))
            .unwrap();
        let detector = CounterfactualBiasDetector::with_registry(registry);
        let corpus = Corpus::new(["he runs", "nothing"]);

        let result = detector.process(&corpus, &counting).unwrap();
        // one original + one sample per concept
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.concept_results.len(), 2);
    }

    #[test]
    fn test_skipped_texts_recorded() {
        let detector = CounterfactualBiasDetector::with_registry(gender_registry())
            .with_config(DetectorConfig::default().with_max_text_bytes(10));
        let corpus = Corpus::new(["he is short", "she is", "he"]);
        let mut observer = CollectingObserver::new();
        let result = detector
            .process_with_observer(&corpus, &constant(), &["gender"], &mut observer)
            .unwrap();

        assert_eq!(result.skipped_texts.len(), 1);
        assert_eq!(result.skipped_texts[0].text_id, 0);
        assert_eq!(result.skipped_texts[0].failure.code, ErrorCode::TokenizationFailed);
        assert_eq!(observer.skipped().len(), 1);
        assert_eq!(result.samples_for("gender").unwrap().len(), 2);
    }

    #[test]
    fn test_parallel_concepts_match_sequential() {
        let mut registry = ConceptRegistry::builtin("en").unwrap();
        registry
            .register(Concept::from_words("jobs", ["doctor", "nurse", "engineer"]))
            .unwrap();
        let corpus = Corpus::new([
            "He is a doctor.",
            "She is a nurse and a Christian.",
            "The old man is an engineer.",
            "My sister is a young doctor from France.",
        ]);
        let model = FnPredictor::new(|batch: &[&str]| {
            Ok(batch
                .iter()
                .map(|t| {
                    let p = (t.len() % 7) as f64 / 10.0;
                    vec![1.0 - p, p]
                })
                .collect())
        })
        .stateless();

        let sequential = CounterfactualBiasDetector::with_registry(registry.clone())
            .process(&corpus, &model)
            .unwrap();
        let parallel = CounterfactualBiasDetector::with_registry(registry)
            .with_config(
                DetectorConfig::default()
                    .with_parallel_concepts(true)
                    .with_parallel_batches(true)
                    .with_max_threads(2),
            )
            .process(&corpus, &model)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_parallel_concepts_report_interleaved_stages() {
        let mut registry = ConceptRegistry::builtin("en").unwrap();
        registry
            .register(Concept::from_words("jobs", ["doctor", "nurse"]))
            .unwrap();
        let detector = CounterfactualBiasDetector::with_registry(registry)
            .with_config(DetectorConfig::default().with_parallel_concepts(true));
        let corpus = Corpus::new(["He is a doctor.", "She is a nurse."]);
        let mut observer = CollectingObserver::new();
        detector
            .process_with_observer(&corpus, &constant(), &["gender", "jobs"], &mut observer)
            .unwrap();

        let boundaries: Vec<(bool, &str)> = observer
            .events
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::StageStart(stage) => Some((true, *stage)),
                ObserverEvent::StageEnd(stage, _) => Some((false, *stage)),
                _ => None,
            })
            .collect();
        // every start is closed by its own end before the next stage begins
        for pair in boundaries.chunks(2) {
            assert_eq!(pair.len(), 2);
            assert!(pair[0].0 && !pair[1].0);
            assert_eq!(pair[0].1, pair[1].1);
        }
        let scored = boundaries
            .iter()
            .filter(|(start, stage)| *start && *stage == STAGE_SCORE)
            .count();
        assert_eq!(scored, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let detector = CounterfactualBiasDetector::with_registry(gender_registry())
            .with_config(DetectorConfig::default().with_batch_size(0));
        let err = detector
            .process(&Corpus::new(["he"]), &constant())
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidValue));
    }

    #[test]
    fn test_register_duplicate() {
        let mut detector = CounterfactualBiasDetector::with_registry(gender_registry());
        let err = detector
            .register_concept(Concept::from_words("gender", ["man", "woman"]))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DuplicateConcept));
    }
}
