//! Error types for voiceweave-pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use voiceweave_core::ProjectError;

/// Invocation and bookkeeping errors from running a pipeline stage.
///
/// A stage that runs to completion and reports `success = false` is *not* an
/// error; it comes back as a [`StepReport`](crate::StepReport). Every
/// invocation variant carries the captured process output for diagnosis.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Resolving, loading or updating the project failed.
    #[error("registry error: {0}")]
    Registry(#[from] ProjectError),

    #[error("no step executor configured (set VOICEWEAVE_EXECUTOR_DIR or pass an executor program)")]
    ExecutorNotConfigured,

    #[error("failed to start step executor {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("step executor produced malformed output: {reason}")]
    MalformedOutput {
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("step executor reported success={success} but exited with {}", exit_label(*code))]
    ExitMismatch {
        success: bool,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("step executor timed out after {after:?}")]
    TimedOut {
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("step cancelled")]
    Cancelled { stdout: String, stderr: String },
}

impl PipelineError {
    /// Standard error captured from the executor, when there was a process.
    pub fn captured_stderr(&self) -> Option<&str> {
        match self {
            PipelineError::MalformedOutput { stderr, .. }
            | PipelineError::ExitMismatch { stderr, .. }
            | PipelineError::TimedOut { stderr, .. }
            | PipelineError::Cancelled { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (killed by signal)".to_owned(),
    }
}

/// Convenience constructor for [`PipelineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}
