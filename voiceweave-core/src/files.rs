//! Linked vs. copied source media.
//!
//! A new local project *links* its source file in place. Copying is one-way:
//! once a reference is copied into `<project>/<subdir>/` it never becomes
//! linked again.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{io_err, ProjectError};
use crate::paths::INPUT_DIR;
use crate::types::{FileReference, FileReferences};

/// Build a linked reference to `path`, capturing size and mtime.
pub fn link(path: &Path) -> Result<FileReference, ProjectError> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProjectError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => io_err(path, e),
    })?;
    if !meta.is_file() {
        return Err(ProjectError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(FileReference {
        path: path.to_path_buf(),
        is_linked: true,
        original_path: None,
        size: Some(meta.len()),
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
    })
}

/// Absolute location of a reference's bytes.
pub fn resolve(project_dir: &Path, reference: &FileReference) -> PathBuf {
    if reference.is_linked {
        reference.path.clone()
    } else {
        project_dir.join(&reference.path)
    }
}

/// Copy a linked file into `<project_dir>/<subdir>/` and rewrite the reference.
///
/// Returns `Ok(false)` when the reference was already copied. On any error
/// the reference is left untouched and a partially written destination is
/// removed.
pub fn copy_if_linked(
    project_dir: &Path,
    subdir: &str,
    reference: &mut FileReference,
) -> Result<bool, ProjectError> {
    if !reference.is_linked {
        return Ok(false);
    }

    let source = reference.path.clone();
    let Some(file_name) = source.file_name() else {
        return Err(ProjectError::CopyFailed {
            path: source,
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        });
    };
    let relative = Path::new(subdir).join(file_name);

    let mut src = File::open(&source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProjectError::LinkedFileMissing {
            path: source.clone(),
        },
        _ => ProjectError::CopyFailed {
            path: source.clone(),
            source: e,
        },
    })?;

    let dest_dir = project_dir.join(subdir);
    std::fs::create_dir_all(&dest_dir).map_err(|e| io_err(&dest_dir, e))?;
    let dest = project_dir.join(&relative);
    let out = File::create(&dest).map_err(|e| io_err(&dest, e))?;
    write_out(&mut src, out, &dest).map_err(|e| ProjectError::CopyFailed {
        path: source.clone(),
        source: e,
    })?;

    tracing::info!(
        from = %source.display(),
        to = %dest.display(),
        "copied linked file into project"
    );
    reference.original_path = Some(source);
    reference.path = relative;
    reference.is_linked = false;
    Ok(true)
}

/// Stream `src` into `out` and flush it to disk. On failure `dest` is removed.
fn write_out(src: &mut impl Read, mut out: File, dest: &Path) -> io::Result<u64> {
    let written = io::copy(src, &mut out).and_then(|n| out.sync_all().map(|()| n));
    if written.is_err() {
        drop(out);
        let _ = std::fs::remove_file(dest);
    }
    written
}

/// Result of [`copy_all_linked`]. Copies made before a failure are kept.
#[derive(Debug)]
pub struct CopyAllOutcome {
    pub copied: usize,
    pub failure: Option<ProjectError>,
}

impl CopyAllOutcome {
    pub fn into_result(self) -> Result<usize, ProjectError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.copied),
        }
    }
}

/// Copy every linked source reference (`videoFile`, then `audioFile`) into
/// the project's `input/` folder, stopping at the first failure.
pub fn copy_all_linked(project_dir: &Path, refs: &mut FileReferences) -> CopyAllOutcome {
    let mut outcome = CopyAllOutcome {
        copied: 0,
        failure: None,
    };
    for reference in [refs.video_file.as_mut(), refs.audio_file.as_mut()]
        .into_iter()
        .flatten()
    {
        match copy_if_linked(project_dir, INPUT_DIR, reference) {
            Ok(true) => outcome.copied += 1,
            Ok(false) => {}
            Err(err) => {
                outcome.failure = Some(err);
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn linked_source(dir: &TempDir, name: &str, bytes: &[u8]) -> FileReference {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        link(&path).unwrap()
    }

    /// Yields some bytes, then fails.
    struct Truncated(bool);

    impl Read for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if std::mem::replace(&mut self.0, true) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source vanished"));
            }
            buf[..4].copy_from_slice(b"RIFF");
            Ok(4)
        }
    }

    #[test]
    fn failed_write_removes_partial_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("partial.wav");
        let out = File::create(&dest).unwrap();

        let err = write_out(&mut Truncated(false), out, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!dest.exists());
    }

    #[test]
    fn link_captures_metadata() {
        let dir = TempDir::new().unwrap();
        let reference = linked_source(&dir, "clip.mp4", b"12345");
        assert!(reference.is_linked);
        assert_eq!(reference.size, Some(5));
        assert!(reference.last_modified.is_some());
        assert!(reference.original_path.is_none());
    }

    #[test]
    fn link_missing_file_is_source_not_found() {
        let dir = TempDir::new().unwrap();
        let err = link(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(err, ProjectError::SourceNotFound { .. }));
    }

    #[test]
    fn copy_rewrites_reference() {
        let src_dir = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut reference = linked_source(&src_dir, "clip.mp4", b"video-bytes");
        let original = reference.path.clone();

        assert!(copy_if_linked(project.path(), "input", &mut reference).unwrap());
        assert!(!reference.is_linked);
        assert_eq!(reference.path, PathBuf::from("input/clip.mp4"));
        assert_eq!(reference.original_path, Some(original));
        assert_eq!(
            std::fs::read(project.path().join("input/clip.mp4")).unwrap(),
            b"video-bytes"
        );
        assert_eq!(resolve(project.path(), &reference), project.path().join("input/clip.mp4"));
    }

    #[test]
    fn copy_is_noop_once_copied() {
        let src_dir = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut reference = linked_source(&src_dir, "a.wav", b"x");
        copy_if_linked(project.path(), "input", &mut reference).unwrap();
        let snapshot = reference.clone();
        assert!(!copy_if_linked(project.path(), "input", &mut reference).unwrap());
        assert_eq!(reference, snapshot);
    }

    #[test]
    fn copy_of_deleted_source_leaves_reference_untouched() {
        let src_dir = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut reference = linked_source(&src_dir, "gone.mp4", b"x");
        std::fs::remove_file(&reference.path).unwrap();
        let snapshot = reference.clone();

        let err = copy_if_linked(project.path(), "input", &mut reference).unwrap_err();
        assert!(matches!(err, ProjectError::LinkedFileMissing { .. }));
        assert_eq!(reference, snapshot);
        assert!(reference.is_linked);
    }

    #[test]
    fn copy_all_keeps_earlier_copies_on_failure() {
        let src_dir = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let video = linked_source(&src_dir, "v.mp4", b"v");
        let audio = linked_source(&src_dir, "a.wav", b"a");
        std::fs::remove_file(&audio.path).unwrap();

        let mut refs = FileReferences {
            video_file: Some(video),
            audio_file: Some(audio),
            ..FileReferences::default()
        };
        let outcome = copy_all_linked(project.path(), &mut refs);
        assert_eq!(outcome.copied, 1);
        assert!(outcome.failure.is_some());
        assert!(!refs.video_file.as_ref().unwrap().is_linked);
        assert!(refs.audio_file.as_ref().unwrap().is_linked);
    }
}
