//! VoiceWeave core library: project documents, settings, naming, file
//! references and the on-disk project registry.
//!
//! - [`types`]: `ProjectConfig`, `AppSettings` and friends
//! - [`error`]: [`ProjectError`]
//! - [`settings`]: [`SettingsStore`]
//! - [`namer`]: display/folder names and clash resolution
//! - [`files`]: linked vs. copied source media
//! - [`registry`]: [`ProjectRegistry`]

pub mod error;
pub mod files;
pub mod namer;
pub mod paths;
pub mod persist;
pub mod registry;
pub mod reveal;
pub mod settings;
mod timestamp;
pub mod types;

pub use error::ProjectError;
pub use registry::{NewProject, ProjectRegistry};
pub use settings::SettingsStore;
pub use types::{
    AppSettings, CompletedSteps, FileReference, FileReferences, ProjectConfig, ProjectId,
    ProjectSettings, SegmentRule, SourceType, Step, TextRule,
};
