//! Pipeline orchestration for Gantry.
//!
//! The engine turns a validated pipeline configuration plus a trigger event
//! into a complete pipeline report: trigger matching, matrix expansion,
//! concurrent job-instance execution with fail-stop and fail-fast
//! semantics, and report aggregation. All side effects go through the
//! collaborator ports defined in `gantry-core`.

pub mod executor;
pub mod matrix;
pub mod runner;
pub mod triggers;

pub use executor::{ExecutorConfig, StepContext, StepExecutor};
pub use matrix::{JobInstance, MatrixExpander};
pub use runner::{PipelineRunner, RunnerOptions};
pub use triggers::{TriggerEvent, TriggerMatcher};
