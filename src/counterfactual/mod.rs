//! Counterfactual generation: swap one protected keyword for another and
//! keep everything else byte-identical.

pub mod case;
pub mod generator;
pub mod sample;

pub use case::CasePattern;
pub use generator::CounterfactualGenerator;
pub use sample::{CounterfactualSample, SampleScore};
