//! Application settings store.
//!
//! `settings.json` is read on first access, cached in memory, and written
//! through atomically on every mutation. A missing file yields first-run
//! defaults without touching the disk.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::ProjectError;
use crate::paths;
use crate::persist;
use crate::types::AppSettings;

/// Owned handle on the settings document.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    default_projects_root: PathBuf,
    cached: Mutex<Option<AppSettings>>,
}

impl SettingsStore {
    /// Store at an explicit location; `default_projects_root` seeds first-run defaults.
    pub fn at(path: impl Into<PathBuf>, default_projects_root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_projects_root: default_projects_root.into(),
            cached: Mutex::new(None),
        }
    }

    /// Store at the OS-appropriate location.
    pub fn open() -> Result<Self, ProjectError> {
        Ok(Self::at(
            paths::settings_path()?,
            paths::default_projects_root()?,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings (defaults if nothing has been persisted yet).
    pub fn load(&self) -> Result<AppSettings, ProjectError> {
        let mut guard = self.lock();
        self.ensure_loaded(&mut guard)
    }

    /// Replace the persisted settings.
    pub fn save(&self, settings: AppSettings) -> Result<(), ProjectError> {
        let mut guard = self.lock();
        persist::write_json_atomic(&self.path, &settings)?;
        *guard = Some(settings);
        Ok(())
    }

    /// Read-modify-write under the store lock; persists after `f` returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppSettings) -> R) -> Result<R, ProjectError> {
        let mut guard = self.lock();
        let mut settings = self.ensure_loaded(&mut guard)?;
        let out = f(&mut settings);
        persist::write_json_atomic(&self.path, &settings)?;
        *guard = Some(settings);
        Ok(out)
    }

    /// Root directory holding every project folder.
    pub fn projects_root(&self) -> Result<PathBuf, ProjectError> {
        Ok(self.load()?.default_projects_path)
    }

    fn ensure_loaded(&self, slot: &mut Option<AppSettings>) -> Result<AppSettings, ProjectError> {
        if let Some(settings) = slot.as_ref() {
            return Ok(settings.clone());
        }
        let settings = if self.path.exists() {
            persist::read_json(&self.path)?
        } else {
            tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
            AppSettings::with_projects_root(self.default_projects_root.clone())
        };
        *slot = Some(settings.clone());
        Ok(settings)
    }

    fn lock(&self) -> MutexGuard<'_, Option<AppSettings>> {
        self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
