//! Open a folder in the OS file browser.

use std::path::Path;
use std::process::Command;

use crate::error::{io_err, ProjectError};

#[cfg(target_os = "macos")]
fn file_browser() -> Result<&'static str, ProjectError> {
    Ok("open")
}

#[cfg(target_os = "windows")]
fn file_browser() -> Result<&'static str, ProjectError> {
    Ok("explorer")
}

#[cfg(target_os = "linux")]
fn file_browser() -> Result<&'static str, ProjectError> {
    Ok("xdg-open")
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn file_browser() -> Result<&'static str, ProjectError> {
    Err(ProjectError::UnsupportedPlatform(std::env::consts::OS))
}

/// Spawn the file browser at `dir` without waiting for it.
pub fn show_in_folder(dir: &Path) -> Result<(), ProjectError> {
    let program = file_browser()?;
    Command::new(program)
        .arg(dir)
        .spawn()
        .map_err(|e| io_err(dir, e))?;
    tracing::debug!(program, dir = %dir.display(), "opened file browser");
    Ok(())
}
