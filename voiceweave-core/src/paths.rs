//! Fixed file names and path resolution.
//!
//! Every resolver has an `_at` form taking explicit roots (tests use a
//! `TempDir`) and a convenience form deriving roots from the `dirs` crate.

use std::path::{Path, PathBuf};

use crate::error::ProjectError;

/// Directory name used under the config dir and under `~/Documents`.
pub const APP_DIR: &str = "VoiceWeave";

pub const SETTINGS_FILE: &str = "settings.json";
pub const PROJECT_FILE: &str = "project.json";

pub const INPUT_DIR: &str = "input";
pub const TRANSCRIPTS_DIR: &str = "transcripts";
pub const AUDIO_DIR: &str = "audio";
pub const OUTPUT_DIR: &str = "output";

/// Subdirectories created inside every project folder.
pub const PROJECT_SUBDIRS: [&str; 4] = [INPUT_DIR, TRANSCRIPTS_DIR, AUDIO_DIR, OUTPUT_DIR];

/// `<config_dir>/VoiceWeave/settings.json`. Pure, no I/O.
pub fn settings_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join(APP_DIR).join(SETTINGS_FILE)
}

/// `settings_path_at` using the OS configuration directory.
pub fn settings_path() -> Result<PathBuf, ProjectError> {
    let config = dirs::config_dir().ok_or(ProjectError::ConfigDirNotFound)?;
    Ok(settings_path_at(&config))
}

/// `<home>/Documents/VoiceWeave`. Pure, no I/O.
pub fn default_projects_root_at(home: &Path) -> PathBuf {
    home.join("Documents").join(APP_DIR)
}

/// `default_projects_root_at` using the user's home directory.
pub fn default_projects_root() -> Result<PathBuf, ProjectError> {
    let home = dirs::home_dir().ok_or(ProjectError::HomeNotFound)?;
    Ok(default_projects_root_at(&home))
}

/// `<project_dir>/project.json`
pub fn project_file(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_is_under_app_dir() {
        let path = settings_path_at(Path::new("/cfg"));
        assert_eq!(path, PathBuf::from("/cfg/VoiceWeave/settings.json"));
    }

    #[test]
    fn projects_root_is_under_documents() {
        let root = default_projects_root_at(Path::new("/home/u"));
        assert!(root.ends_with("Documents/VoiceWeave"));
    }
}
