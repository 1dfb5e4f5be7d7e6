//! Project registry: create, locate, update and delete projects.
//!
//! # Storage layout
//!
//! ```text
//! <projects_root>/
//!   <name> [<videoId>] [<LANG>]/
//!     project.json      (ProjectConfig, pretty JSON, atomic writes)
//!     input/ transcripts/ audio/ output/
//! ```
//!
//! # Lookup
//!
//! Folders are named for humans, so a project is found by the `id` inside
//! its `project.json`. The registry keeps an in-memory `id → folder` index
//! built by one directory scan. A cached folder is re-read on every lookup;
//! if it is gone or now holds another ID (renamed or replaced outside the
//! app) the index is rebuilt before reporting not-found.
//!
//! The project document and `settings.json` are separate files written
//! independently; a crash between the two writes can leave the recent list
//! naming a project whose folder is missing. `list_recent` skips those.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{io_err, ProjectError};
use crate::files;
use crate::namer;
use crate::paths::{self, PROJECT_SUBDIRS};
use crate::persist;
use crate::reveal;
use crate::settings::SettingsStore;
use crate::types::{
    CompletedSteps, FileReferences, ProjectConfig, ProjectId, ProjectSettings, SourceType,
};

/// Inputs for [`ProjectRegistry::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub source_type: SourceType,
    /// YouTube URL/ID, or a local file path.
    pub source: String,
    pub target_language: String,
    pub custom_name: Option<String>,
}

type FolderIndex = HashMap<ProjectId, PathBuf>;

/// Durable CRUD over [`ProjectConfig`] documents under the projects root.
#[derive(Debug)]
pub struct ProjectRegistry {
    settings: SettingsStore,
    index: Mutex<Option<FolderIndex>>,
}

impl ProjectRegistry {
    pub fn new(settings: SettingsStore) -> Self {
        Self {
            settings,
            index: Mutex::new(None),
        }
    }

    /// Registry backed by the OS-default settings location.
    pub fn from_env() -> Result<Self, ProjectError> {
        Ok(Self::new(SettingsStore::open()?))
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn projects_root(&self) -> Result<PathBuf, ProjectError> {
        self.settings.projects_root()
    }

    // -----------------------------------------------------------------------
    // 1. Create
    // -----------------------------------------------------------------------

    /// Create a project folder, its subdirectories and `project.json`, and
    /// put the new ID at the front of the recent list.
    pub fn create(&self, request: NewProject) -> Result<ProjectConfig, ProjectError> {
        namer::check_language(&request.target_language)?;
        let id = ProjectId::generate();
        let root = self.projects_root()?;
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

        let now = Utc::now();
        let mut file_references = FileReferences::default();
        let (video_id, source_url, original_filename) = match request.source_type {
            SourceType::Youtube => {
                let video_id = namer::extract_youtube_id(&request.source)
                    .ok_or_else(|| ProjectError::InvalidYoutubeUrl(request.source.clone()))?;
                (video_id, Some(request.source.clone()), None)
            }
            SourceType::Video | SourceType::Audio => {
                let source = Path::new(&request.source);
                let reference = files::link(source)?;
                if request.source_type == SourceType::Video {
                    file_references.video_file = Some(reference);
                } else {
                    file_references.audio_file = Some(reference);
                }
                let filename = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                (namer::local_video_id(now), None, filename)
            }
        };

        let name = namer::display_name(
            request.source_type,
            &request.source,
            &video_id,
            request.custom_name.as_deref(),
        );
        let base = namer::folder_name(&name, &video_id, &request.target_language);
        let resolved = namer::resolve_clash(&root, &base)?;
        let project_dir = resolved.path_in(&root);

        let project = ProjectConfig {
            id: id.clone(),
            name,
            created: now,
            last_modified: now,
            version: resolved.version,
            source_type: request.source_type,
            source_url,
            video_id: Some(video_id),
            original_filename,
            target_language: request.target_language,
            completed_steps: CompletedSteps::default(),
            file_references,
            settings: ProjectSettings::default(),
            text_rules: Vec::new(),
            segment_rules: Vec::new(),
        };

        if let Err(err) = scaffold_project_dir(&project_dir, &project) {
            let _ = std::fs::remove_dir_all(&project_dir);
            return Err(err);
        }
        self.index_insert(&id, &project_dir);

        tracing::info!(
            id = %id,
            folder = %resolved.folder_name,
            source_type = %project.source_type,
            "created project"
        );

        if let Err(err) = self.settings.update(|s| s.push_recent(&id)) {
            tracing::warn!(id = %id, error = %err, "failed to update recent projects");
        }
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // 2. Load / locate
    // -----------------------------------------------------------------------

    /// Load a project by ID.
    pub fn load(&self, id: &ProjectId) -> Result<ProjectConfig, ProjectError> {
        self.resolve(id).map(|(_, project)| project)
    }

    /// Load a project and move it to the front of the recent list.
    pub fn open(&self, id: &ProjectId) -> Result<ProjectConfig, ProjectError> {
        let project = self.load(id)?;
        self.settings.update(|s| s.push_recent(id))?;
        Ok(project)
    }

    /// Storage folder of a project.
    pub fn project_dir(&self, id: &ProjectId) -> Result<PathBuf, ProjectError> {
        self.resolve(id).map(|(dir, _)| dir)
    }

    /// Every loadable project under the root, sorted by folder name.
    pub fn list_all(&self) -> Result<Vec<(PathBuf, ProjectConfig)>, ProjectError> {
        let root = self.projects_root()?;
        let found = scan_projects(&root)?;
        *self.lock_index() = Some(build_index(&found));
        Ok(found)
    }

    /// Projects named in the recent list, most recent first. Entries that no
    /// longer load are skipped.
    pub fn list_recent(&self) -> Vec<ProjectConfig> {
        let recent = match self.settings.load() {
            Ok(settings) => settings.recent_projects,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read settings; no recent projects");
                return Vec::new();
            }
        };
        recent
            .iter()
            .filter_map(|id| match self.load(id) {
                Ok(project) => Some(project),
                Err(err) => {
                    tracing::debug!(id = %id, error = %err, "skipping recent project");
                    None
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // 3. Update / delete
    // -----------------------------------------------------------------------

    /// Stamp `last_modified` and overwrite the project's document.
    pub fn update(&self, project: &mut ProjectConfig) -> Result<(), ProjectError> {
        let dir = self.project_dir(&project.id)?;
        project.last_modified = Utc::now();
        persist::write_json_atomic(&paths::project_file(&dir), project)?;
        tracing::debug!(id = %project.id, "updated project");
        Ok(())
    }

    /// Remove the project folder and its recent-list entry.
    ///
    /// The recent-list cleanup is best effort: a settings failure is logged
    /// and does not fail the delete.
    pub fn delete(&self, id: &ProjectId) -> Result<(), ProjectError> {
        let dir = self.project_dir(id)?;
        std::fs::remove_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        if let Some(index) = self.lock_index().as_mut() {
            index.remove(id);
        }
        tracing::info!(id = %id, folder = %dir.display(), "deleted project");

        if let Err(err) = self.settings.update(|s| s.remove_recent(id)) {
            tracing::warn!(id = %id, error = %err, "failed to drop project from recent list");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // 4. Files
    // -----------------------------------------------------------------------

    /// Copy every linked source file into `input/` and persist the rewritten
    /// references. Copies made before a failure are persisted too.
    pub fn copy_linked_files(&self, id: &ProjectId) -> Result<usize, ProjectError> {
        let (dir, mut project) = self.resolve(id)?;
        let outcome = files::copy_all_linked(&dir, &mut project.file_references);
        if outcome.copied > 0 {
            self.update(&mut project)?;
        }
        outcome.into_result()
    }

    /// Open the project folder in the OS file browser.
    pub fn show_in_folder(&self, id: &ProjectId) -> Result<(), ProjectError> {
        reveal::show_in_folder(&self.project_dir(id)?)
    }

    // -----------------------------------------------------------------------
    // Index
    // -----------------------------------------------------------------------

    fn resolve(&self, id: &ProjectId) -> Result<(PathBuf, ProjectConfig), ProjectError> {
        let cached = self
            .lock_index()
            .as_ref()
            .and_then(|index| index.get(id).cloned());
        if let Some(dir) = cached {
            if let Some(project) = read_if_matches(&dir, id) {
                return Ok((dir, project));
            }
            tracing::debug!(id = %id, folder = %dir.display(), "stale index entry");
        }

        let root = self.projects_root()?;
        let found = scan_projects(&root)?;
        let hit = found
            .iter()
            .find(|(_, project)| &project.id == id)
            .cloned();
        *self.lock_index() = Some(build_index(&found));
        tracing::debug!(projects = found.len(), "rebuilt project index");

        hit.ok_or_else(|| ProjectError::ProjectNotFound { id: id.clone() })
    }

    fn index_insert(&self, id: &ProjectId, dir: &Path) {
        if let Some(index) = self.lock_index().as_mut() {
            index.insert(id.clone(), dir.to_path_buf());
        }
    }

    fn lock_index(&self) -> MutexGuard<'_, Option<FolderIndex>> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Fill a folder already claimed by [`namer::resolve_clash`].
fn scaffold_project_dir(dir: &Path, project: &ProjectConfig) -> Result<(), ProjectError> {
    for sub in PROJECT_SUBDIRS {
        let path = dir.join(sub);
        std::fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;
    }
    persist::write_json_atomic(&paths::project_file(dir), project)
}

fn read_if_matches(dir: &Path, id: &ProjectId) -> Option<ProjectConfig> {
    persist::read_json::<ProjectConfig>(&paths::project_file(dir))
        .ok()
        .filter(|project| &project.id == id)
}

/// Read `project.json` from every immediate subdirectory of `root`, sorted by
/// folder name. Folders without a readable document are skipped.
fn scan_projects(root: &Path) -> Result<Vec<(PathBuf, ProjectConfig)>, ProjectError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|e| io_err(root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    dirs.sort();

    let mut found = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match persist::read_json::<ProjectConfig>(&paths::project_file(&dir)) {
            Ok(project) => found.push((dir, project)),
            Err(err) => {
                tracing::debug!(folder = %dir.display(), error = %err, "not a project folder");
            }
        }
    }
    Ok(found)
}

/// First folder wins when two documents claim the same ID.
fn build_index(found: &[(PathBuf, ProjectConfig)]) -> FolderIndex {
    let mut index = FolderIndex::with_capacity(found.len());
    for (dir, project) in found {
        index
            .entry(project.id.clone())
            .or_insert_with(|| dir.clone());
    }
    index
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(home: &TempDir) -> ProjectRegistry {
        ProjectRegistry::new(SettingsStore::at(
            paths::settings_path_at(&home.path().join("config")),
            home.path().join("projects"),
        ))
    }

    fn youtube(lang: &str) -> NewProject {
        NewProject {
            source_type: SourceType::Youtube,
            source: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            target_language: lang.into(),
            custom_name: None,
        }
    }

    #[test]
    fn create_youtube_project_defaults() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let project = reg.create(youtube("fr")).expect("create");

        assert_eq!(project.name, "YouTube Video dQw4w9WgXcQ");
        assert_eq!(project.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(project.version, 1);
        assert!(project.original_filename.is_none());
        assert!(project.settings.transcription.enable_diarization);
        assert_eq!(project.settings.translation.mode, "simple");

        let dir = reg.project_dir(&project.id).unwrap();
        assert!(dir.ends_with("YouTube Video dQw4w9WgXcQ [dQw4w9WgXcQ] [FR]"));
    }

    #[test]
    fn invalid_youtube_url_is_rejected_before_any_folder() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let mut req = youtube("fr");
        req.source = "https://example.com/video".into();
        let err = reg.create(req).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidYoutubeUrl(_)));
        assert!(reg.list_all().unwrap().is_empty());
    }

    #[test]
    fn stale_index_entry_is_rebuilt_after_external_rename() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let project = reg.create(youtube("de")).unwrap();
        let old_dir = reg.project_dir(&project.id).unwrap();

        let new_dir = old_dir.with_file_name("renamed by user");
        std::fs::rename(&old_dir, &new_dir).unwrap();

        assert_eq!(reg.project_dir(&project.id).unwrap(), new_dir);
        assert_eq!(reg.load(&project.id).unwrap().id, project.id);
    }

    #[test]
    fn load_unknown_id_is_not_found() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let err = reg.load(&ProjectId::from("missing")).unwrap_err();
        assert!(matches!(err, ProjectError::ProjectNotFound { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn scan_skips_folders_without_documents() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let project = reg.create(youtube("es")).unwrap();
        let root = reg.projects_root().unwrap();
        std::fs::create_dir_all(root.join("stray folder")).unwrap();
        std::fs::create_dir_all(root.join("broken")).unwrap();
        std::fs::write(root.join("broken").join("project.json"), "{ not json").unwrap();

        let all = reg.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.id, project.id);
    }

    #[test]
    fn update_stamps_last_modified() {
        let home = TempDir::new().unwrap();
        let reg = registry(&home);
        let mut project = reg.create(youtube("es")).unwrap();
        let before = project.last_modified;
        project.name = "Renamed".into();
        std::thread::sleep(std::time::Duration::from_millis(5));
        reg.update(&mut project).unwrap();

        let loaded = reg.load(&project.id).unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert!(loaded.last_modified > before);
        assert_eq!(loaded.created, project.created);
    }
}
