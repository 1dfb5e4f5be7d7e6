//! # voiceweave-pipeline
//!
//! Runs the five dubbing stages (`download`, `transcribe`, `translate`,
//! `synthesize`, `combine`) through an external step executor.
//!
//! Build an [`Orchestrator`] over a [`voiceweave_core::ProjectRegistry`] and a
//! [`StepExecutor`]; [`ProcessExecutor`] launches the executor program
//! described by an [`ExecutorConfig`].

pub mod error;
pub mod executor;
pub mod orchestrator;

pub use error::PipelineError;
pub use executor::{
    CancelToken, ExecutorConfig, ProcessExecutor, RunOptions, StepExecutor, StepReport,
    EXECUTOR_DIR_ENV,
};
pub use orchestrator::{Orchestrator, PipelineReport, StepRecord};
