//! Display names, folder names, and clash resolution for new projects.
//!
//! Folder layout: `"<sanitized name> [<videoId>] [<LANG>]"`, with `" (N)"`
//! appended when that folder already exists under the projects root.

use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{io_err, ProjectError};
use crate::types::SourceType;

/// Prefix of the default display name for YouTube sources.
pub const PLATFORM_LABEL: &str = "YouTube Video";

/// Character cap applied to the sanitized display name (before the suffix).
pub const MAX_NAME_CHARS: usize = 50;

/// Upper bound on clash-resolution attempts.
pub const MAX_NAME_ATTEMPTS: u32 = 500;

const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Extract the video ID from a watch URL, a short URL, or a bare 11-char ID.
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let candidate = if url.contains("youtube.com/watch?v=") {
        url.split_once("v=")
            .map(|(_, rest)| rest.split('&').next().unwrap_or_default())
    } else if url.contains("youtu.be/") {
        url.split_once("youtu.be/")
            .map(|(_, rest)| rest.split('?').next().unwrap_or_default())
    } else if url.chars().count() == 11 && !url.contains('/') {
        Some(url)
    } else {
        None
    };
    candidate.filter(|id| is_token(id)).map(str::to_owned)
}

/// Check a target language code such as `es`, `pt-BR` or `zh_Hans`.
pub fn check_language(code: &str) -> Result<(), ProjectError> {
    if is_token(code) {
        Ok(())
    } else {
        Err(ProjectError::InvalidLanguage(code.to_owned()))
    }
}

/// Non-empty and limited to ASCII letters, digits, `-` and `_`.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Identifier for local media: `local_<unix seconds>`.
pub fn local_video_id(now: DateTime<Utc>) -> String {
    format!("local_{}", now.timestamp())
}

/// Display name for a new project when the caller supplied none (or an empty one).
pub fn display_name(
    source_type: SourceType,
    source: &str,
    video_id: &str,
    custom_name: Option<&str>,
) -> String {
    if let Some(custom) = custom_name.map(str::trim).filter(|c| !c.is_empty()) {
        return custom.to_owned();
    }
    match source_type {
        SourceType::Youtube => format!("{PLATFORM_LABEL} {video_id}"),
        SourceType::Video | SourceType::Audio => Path::new(source)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_owned()),
    }
}

/// Make `name` safe for use as a single path component.
///
/// Reserved characters become `-`, control characters are dropped, the
/// result is capped at [`MAX_NAME_CHARS`] and trimmed.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if RESERVED.contains(&c) { '-' } else { c })
        .take(MAX_NAME_CHARS)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Untitled".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Base folder name before clash resolution.
pub fn folder_name(display_name: &str, video_id: &str, target_language: &str) -> String {
    format!(
        "{} [{}] [{}]",
        sanitize(display_name),
        video_id,
        target_language.to_uppercase()
    )
}

/// A folder name that does not yet exist under the projects root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub folder_name: String,
    /// 1 when the base name was free, N when `" (N)"` was appended.
    pub version: u32,
}

impl ResolvedName {
    pub fn path_in(&self, projects_root: &Path) -> PathBuf {
        projects_root.join(&self.folder_name)
    }
}

/// Claim the first free `base`, `base (2)`, `base (3)`, … under
/// `projects_root` by creating that folder.
///
/// Fails with [`ProjectError::NamespaceExhausted`] after [`MAX_NAME_ATTEMPTS`],
/// and with [`ProjectError::InvalidFolderName`] when `base` is not a single
/// path component.
pub fn resolve_clash(projects_root: &Path, base: &str) -> Result<ResolvedName, ProjectError> {
    resolve_clash_bounded(projects_root, base, MAX_NAME_ATTEMPTS)
}

fn resolve_clash_bounded(
    projects_root: &Path,
    base: &str,
    max_attempts: u32,
) -> Result<ResolvedName, ProjectError> {
    let mut components = Path::new(base).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(ProjectError::InvalidFolderName(base.to_owned()));
    }

    for version in 1..=max_attempts {
        let candidate = if version == 1 {
            base.to_owned()
        } else {
            format!("{base} ({version})")
        };
        let path = projects_root.join(&candidate);
        match std::fs::create_dir(&path) {
            Ok(()) => {
                if version > 1 {
                    tracing::debug!(base, version, "resolved folder name clash");
                }
                return Ok(ResolvedName {
                    folder_name: candidate,
                    version,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(io_err(&path, e)),
        }
    }
    Err(ProjectError::NamespaceExhausted {
        base: base.to_owned(),
        attempts: max_attempts,
    })
}
