//! Pipeline execution, error reporting, and observation.
//!
//! ## Submodules
//!
//! - [`error_code`]: Stable machine-readable error codes
//! - [`errors`]: Configuration errors and per-unit stage failures
//! - [`observer`]: Progress, timing, and diagnostic hooks
//! - [`runner`]: The detection entry point wiring every stage together

pub mod error_code;
pub mod errors;
pub mod observer;
pub mod runner;

pub use error_code::ErrorCode;
pub use errors::{ConfigError, StageFailure};
pub use observer::{
    CollectingObserver, NoopObserver, ObserverEvent, PipelineObserver, StageClock, StageReport,
    StageReportBuilder,
};
pub use runner::CounterfactualBiasDetector;
