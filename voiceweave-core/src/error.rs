//! Error types for voiceweave-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProjectId;

/// All errors that can arise from settings, naming, file-reference and
/// registry operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Underlying I/O failure, annotated with the path it happened at.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load, with the file path.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// `dirs::config_dir()` returned `None`.
    #[error("cannot determine the user configuration directory")]
    ConfigDirNotFound,

    /// No folder under the projects root holds a document with this ID.
    #[error("project not found: {id}")]
    ProjectNotFound { id: ProjectId },

    /// The local source handed to `create` does not exist.
    #[error("source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// A linked reference points at a file that was moved or deleted.
    #[error("linked file is missing: {path}")]
    LinkedFileMissing { path: PathBuf },

    /// Copying a linked file into project storage failed.
    #[error("failed to copy {path} into the project: {source}")]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source type '{0}'; expected: youtube, video, audio")]
    InvalidSourceType(String),

    #[error("unknown pipeline step '{0}'; expected: download, transcribe, translate, synthesize, combine")]
    InvalidStep(String),

    #[error("invalid YouTube URL: {0}")]
    InvalidYoutubeUrl(String),

    #[error("invalid target language '{0}'; expected a code like 'es' or 'pt-BR'")]
    InvalidLanguage(String),

    /// A derived folder name would not be a single entry under the projects root.
    #[error("invalid project folder name '{0}'")]
    InvalidFolderName(String),

    /// Clash resolution ran past its attempt bound.
    #[error("no free folder name for '{base}' after {attempts} attempts")]
    NamespaceExhausted { base: String, attempts: u32 },

    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(&'static str),
}

/// Convenience constructor for [`ProjectError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ProjectError {
    ProjectError::Io {
        path: path.into(),
        source,
    }
}
