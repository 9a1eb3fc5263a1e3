//! Pipeline observers: progress and diagnostic hooks.
//!
//! The runner reports stage boundaries, scoring progress and recoverable
//! failures to a [`PipelineObserver`]. All methods have no-op defaults so
//! an observer only implements what it cares about.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::pipeline::errors::StageFailure;

pub const STAGE_TOKENIZE: &str = "tokenize";
pub const STAGE_DETECT: &str = "detect";
pub const STAGE_SCORE_ORIGINALS: &str = "score_originals";
pub const STAGE_GENERATE: &str = "generate";
pub const STAGE_SCORE: &str = "score";
pub const STAGE_AGGREGATE: &str = "aggregate";

/// Wall-clock timer for a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// What a finished stage reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub elapsed: Duration,
    /// Concept the stage ran for; `None` for corpus-wide stages
    pub concept: Option<String>,
    /// Items produced (tokens, matches, samples, ...)
    pub items: usize,
    pub failures: usize,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            ..Self::default()
        }
    }
}

/// Builder for reports that carry counts.
#[derive(Debug, Clone)]
pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            report: StageReport::new(elapsed),
        }
    }

    pub fn concept(mut self, concept: impl Into<String>) -> Self {
        self.report.concept = Some(concept.into());
        self
    }

    pub fn items(mut self, items: usize) -> Self {
        self.report.items = items;
        self
    }

    pub fn failures(mut self, failures: usize) -> Self {
        self.report.failures = failures;
        self
    }

    pub fn build(self) -> StageReport {
        self.report
    }
}

pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &'static str) {}

    fn on_stage_end(&mut self, _stage: &'static str, _report: &StageReport) {}

    /// A prediction batch finished; `done` of `total` batches are complete.
    fn on_batch(&mut self, _stage: &'static str, _done: usize, _total: usize) {}

    fn on_batch_failed(&mut self, _failure: &StageFailure) {}

    fn on_text_skipped(&mut self, _text_id: usize, _failure: &StageFailure) {}
}

/// Ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// One recorded observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    StageStart(&'static str),
    StageEnd(&'static str, StageReport),
    Batch {
        stage: &'static str,
        done: usize,
        total: usize,
    },
    BatchFailed(StageFailure),
    TextSkipped(usize, StageFailure),
}

/// Records every callback in arrival order; handy in tests and for
/// post-run diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CollectingObserver {
    pub events: Vec<ObserverEvent>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::StageStart(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<(&'static str, &StageReport)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::StageEnd(stage, report) => Some((*stage, report)),
                _ => None,
            })
            .collect()
    }

    pub fn batches(&self) -> Vec<(&'static str, usize, usize)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                ObserverEvent::Batch { stage, done, total } => Some((stage, done, total)),
                _ => None,
            })
            .collect()
    }

    pub fn failed_batches(&self) -> Vec<&StageFailure> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::BatchFailed(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<(usize, &StageFailure)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::TextSkipped(id, failure) => Some((*id, failure)),
                _ => None,
            })
            .collect()
    }

    /// Total time recorded for `stage` across all concepts.
    pub fn time_in(&self, stage: &str) -> Duration {
        self.reports()
            .into_iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, r)| r.elapsed)
            .sum()
    }

    /// Forward everything recorded so far to another observer, in the order
    /// it arrived.
    pub fn replay_into<O: PipelineObserver + ?Sized>(&self, target: &mut O) {
        for event in &self.events {
            match event {
                ObserverEvent::StageStart(stage) => target.on_stage_start(*stage),
                ObserverEvent::StageEnd(stage, report) => target.on_stage_end(*stage, report),
                ObserverEvent::Batch { stage, done, total } => {
                    target.on_batch(*stage, *done, *total)
                }
                ObserverEvent::BatchFailed(failure) => target.on_batch_failed(failure),
                ObserverEvent::TextSkipped(id, failure) => target.on_text_skipped(*id, failure),
            }
        }
    }
}

impl PipelineObserver for CollectingObserver {
    fn on_stage_start(&mut self, stage: &'static str) {
        self.events.push(ObserverEvent::StageStart(stage));
    }

    fn on_stage_end(&mut self, stage: &'static str, report: &StageReport) {
        self.events.push(ObserverEvent::StageEnd(stage, report.clone()));
    }

    fn on_batch(&mut self, stage: &'static str, done: usize, total: usize) {
        self.events.push(ObserverEvent::Batch { stage, done, total });
    }

    fn on_batch_failed(&mut self, failure: &StageFailure) {
        self.events.push(ObserverEvent::BatchFailed(failure.clone()));
    }

    fn on_text_skipped(&mut self, text_id: usize, failure: &StageFailure) {
        self.events
            .push(ObserverEvent::TextSkipped(text_id, failure.clone()));
    }
}
