//! Domain types for VoiceWeave projects and application settings.
//!
//! All path fields use `PathBuf`. Every document type serializes to the
//! camelCase JSON layout shared with the external step executors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProjectError;

/// Maximum length of [`AppSettings::recent_projects`].
pub const RECENT_CAPACITY: usize = 5;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, immutable project identifier (128 random bits, hex-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where a project's media comes from. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Youtube,
    Video,
    Audio,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Youtube => "youtube",
            SourceType::Video => "video",
            SourceType::Audio => "audio",
        }
    }

    /// `true` for sources that reference a file on the local disk.
    pub fn is_local(self) -> bool {
        matches!(self, SourceType::Video | SourceType::Audio)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(SourceType::Youtube),
            "video" => Ok(SourceType::Video),
            "audio" => Ok(SourceType::Audio),
            other => Err(ProjectError::InvalidSourceType(other.to_owned())),
        }
    }
}

/// One of the five fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Download,
    Transcribe,
    Translate,
    Synthesize,
    Combine,
}

impl Step {
    /// All stages in pipeline order.
    pub const ALL: [Step; 5] = [
        Step::Download,
        Step::Transcribe,
        Step::Translate,
        Step::Synthesize,
        Step::Combine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Download => "download",
            Step::Transcribe => "transcribe",
            Step::Translate => "translate",
            Step::Synthesize => "synthesize",
            Step::Combine => "combine",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| ProjectError::InvalidStep(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Project document
// ---------------------------------------------------------------------------

/// Completion flags for the five stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletedSteps {
    pub download: bool,
    pub transcribe: bool,
    pub translate: bool,
    pub synthesize: bool,
    pub combine: bool,
}

impl CompletedSteps {
    pub fn get(&self, step: Step) -> bool {
        match step {
            Step::Download => self.download,
            Step::Transcribe => self.transcribe,
            Step::Translate => self.translate,
            Step::Synthesize => self.synthesize,
            Step::Combine => self.combine,
        }
    }

    /// Set one flag; returns `true` if the value changed.
    pub fn set(&mut self, step: Step, done: bool) -> bool {
        let slot = match step {
            Step::Download => &mut self.download,
            Step::Transcribe => &mut self.transcribe,
            Step::Translate => &mut self.translate,
            Step::Synthesize => &mut self.synthesize,
            Step::Combine => &mut self.combine,
        };
        let changed = *slot != done;
        *slot = done;
        changed
    }

    pub fn all_done(&self) -> bool {
        Step::ALL.iter().all(|s| self.get(*s))
    }
}

/// One source media file, either linked in place or copied into the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Absolute path when linked, project-relative path once copied.
    pub path: PathBuf,
    pub is_linked: bool,
    /// Where the file lived before it was copied into the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::option"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Source references plus project-relative paths to stage artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_file: Option<FileReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<FileReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_audio: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSettings {
    pub source: String,
    pub enable_diarization: bool,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedTranslationSettings {
    pub context_window: u32,
    pub enable_judge: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSettings {
    pub mode: String,
    pub simple_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_settings: Option<AdvancedTranslationSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub prevent_overlaps: bool,
    pub min_gap: u32,
    pub global_crossfade: bool,
    pub crossfade_duration: u32,
    pub effects_preset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSettings {
    pub mode: String,
    pub keep_intermediate_files: bool,
}

/// Per-project processing configuration, handed to step executors verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub transcription: TranscriptionSettings,
    pub translation: TranslationSettings,
    pub audio: AudioSettings,
    pub cleanup: CleanupSettings,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            transcription: TranscriptionSettings {
                source: "whisperx".to_owned(),
                enable_diarization: true,
                language: "en".to_owned(),
                model: None,
            },
            translation: TranslationSettings {
                mode: "simple".to_owned(),
                simple_model: "m2m100_418m".to_owned(),
                cloud_provider: None,
                advanced_settings: None,
            },
            audio: AudioSettings {
                prevent_overlaps: true,
                min_gap: 100,
                global_crossfade: false,
                crossfade_duration: 150,
                effects_preset: "voice".to_owned(),
            },
            cleanup: CleanupSettings {
                mode: "auto".to_owned(),
                keep_intermediate_files: false,
            },
        }
    }
}

/// User-defined text substitution applied by the executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRule {
    pub id: String,
    pub original_text: String,
    pub replacement_text: String,
    pub language: String,
    pub priority: String,
    pub case_sensitive: bool,
    pub created_at: String,
}

/// User-defined segment rule; conditions and actions are free-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub conditions: Map<String, Value>,
    #[serde(default)]
    pub actions: Map<String, Value>,
    pub enabled: bool,
    pub created_at: String,
}

/// The persisted `project.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: ProjectId,
    pub name: String,
    #[serde(with = "crate::timestamp")]
    pub created: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub last_modified: DateTime<Utc>,
    /// Number of naming clashes resolved at creation (1 = none).
    pub version: u32,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub target_language: String,
    #[serde(default)]
    pub completed_steps: CompletedSteps,
    #[serde(default)]
    pub file_references: FileReferences,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub text_rules: Vec<TextRule>,
    #[serde(default)]
    pub segment_rules: Vec<SegmentRule>,
}

// ---------------------------------------------------------------------------
// Application settings
// ---------------------------------------------------------------------------

/// Process-wide preferences persisted in `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub default_projects_path: PathBuf,
    pub auto_cleanup: String,
    pub show_onboarding: bool,
    /// Most-recent-first, at most [`RECENT_CAPACITY`] entries.
    #[serde(default)]
    pub recent_projects: Vec<ProjectId>,
    pub export_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_export_path: Option<String>,
}

impl AppSettings {
    /// First-run defaults rooted at `projects_root`.
    pub fn with_projects_root(projects_root: PathBuf) -> Self {
        Self {
            default_projects_path: projects_root,
            auto_cleanup: "auto".to_owned(),
            show_onboarding: true,
            recent_projects: Vec::new(),
            export_location: "project-folder".to_owned(),
            custom_export_path: None,
        }
    }

    /// Move `id` to the front of the recency list, dropping the oldest entry
    /// past [`RECENT_CAPACITY`].
    pub fn push_recent(&mut self, id: &ProjectId) {
        self.recent_projects.retain(|r| r != id);
        self.recent_projects.insert(0, id.clone());
        self.recent_projects.truncate(RECENT_CAPACITY);
    }

    /// Remove `id` from the recency list; returns `true` if it was present.
    pub fn remove_recent(&mut self, id: &ProjectId) -> bool {
        let before = self.recent_projects.len();
        self.recent_projects.retain(|r| r != id);
        self.recent_projects.len() != before
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
