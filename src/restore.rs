//! Rebuilding a file tree from a manifest.

use crate::error::{PathIssue, SnapcubeError};
use crate::pool::CancellationFlag;
use crate::types::{Entry, Manifest, RestoreReport, join_path};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Writes every entry of `manifest` below `destination`.
///
/// Each file lands at `destination/filePath/fileName` through a temporary file
/// and a rename, replacing whatever was there. Per-entry failures are collected
/// in the report; only a destination that cannot be created is fatal.
/// Structure-only manifests are refused, see [`restore_skeleton`].
pub fn restore(
    manifest: &Manifest,
    destination: &Path,
    cancel: &CancellationFlag,
) -> Result<RestoreReport, SnapcubeError> {
    let entries = match manifest {
        Manifest::Entries(entries) => entries,
        Manifest::Paths(_) => return Err(SnapcubeError::StructureOnlyRestoreAttempted),
    };
    let mut target = Target::open(destination)?;
    info!(destination = %destination.display(), entries = entries.len(), "Restoring manifest");
    for entry in entries {
        cancel.check()?;
        let relative = entry.relative_path();
        if let Err(e) = target.write_entry(entry) {
            warn!(path = %relative, "{}", e);
            target.report.failures.push(PathIssue::new(relative, &e));
        }
    }
    Ok(target.report)
}

/// Recreates the paths of a manifest as empty files, ignoring any content.
pub fn restore_skeleton(
    manifest: &Manifest,
    destination: &Path,
    cancel: &CancellationFlag,
) -> Result<RestoreReport, SnapcubeError> {
    let mut target = Target::open(destination)?;
    info!(destination = %destination.display(), paths = manifest.len(), "Restoring skeleton");
    for relative in manifest.paths() {
        cancel.check()?;
        let placed = match relative.rsplit_once('/') {
            Some((dir, name)) => target.place(dir, name),
            None => target.place("", &relative),
        };
        if let Err(e) = placed.and_then(|path| target.write_file(&path, &[])) {
            warn!(path = %relative, "{}", e);
            target.report.failures.push(PathIssue::new(relative, &e));
        }
    }
    Ok(target.report)
}

struct Target {
    root: PathBuf,
    known_dirs: HashSet<PathBuf>,
    report: RestoreReport,
}

impl Target {
    fn open(root: &Path) -> Result<Self, SnapcubeError> {
        let mut target = Self {
            root: root.to_path_buf(),
            known_dirs: HashSet::new(),
            report: RestoreReport::default(),
        };
        target.ensure_dir(root)?;
        Ok(target)
    }

    fn write_entry(&mut self, entry: &Entry) -> Result<(), SnapcubeError> {
        let path = self.place(&entry.file_path, &entry.file_name)?;
        let bytes = entry.bytes()?;
        self.write_file(&path, &bytes)
    }

    /// Resolves `dir/name` below the root, refusing anything that could escape it.
    fn place(&self, dir: &str, name: &str) -> Result<PathBuf, SnapcubeError> {
        let unsafe_path = || SnapcubeError::UnsafePath(join_path(dir, name));
        if !is_safe_segment(name) {
            return Err(unsafe_path());
        }
        let mut path = self.root.clone();
        if !dir.is_empty() {
            for segment in dir.split('/') {
                if !is_safe_segment(segment) {
                    return Err(unsafe_path());
                }
                path.push(segment);
            }
        }
        path.push(name);
        Ok(path)
    }

    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<(), SnapcubeError> {
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        self.ensure_dir(&parent)?;
        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| SnapcubeError::io(&parent, e))?;
        temp.write_all(bytes)
            .map_err(|e| SnapcubeError::io(path, e))?;
        temp.persist(path).map_err(|e| SnapcubeError::io(path, e.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
        self.report.files_written += 1;
        Ok(())
    }

    /// Creates `dir` and any missing ancestors, counting the ones it made.
    fn ensure_dir(&mut self, dir: &Path) -> Result<(), SnapcubeError> {
        if self.known_dirs.contains(dir) {
            return Ok(());
        }
        let mut missing = Vec::new();
        let mut cursor = Some(dir);
        while let Some(current) = cursor {
            if current.as_os_str().is_empty() || self.known_dirs.contains(current) {
                break;
            }
            match fs::metadata(current) {
                Ok(meta) if meta.is_dir() => break,
                Ok(_) => {
                    return Err(SnapcubeError::io(
                        current,
                        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "not a directory"),
                    ));
                }
                Err(_) => missing.push(current.to_path_buf()),
            }
            cursor = current.parent();
        }
        for created in missing.iter().rev() {
            match fs::create_dir(created) {
                Ok(()) => self.report.directories_created += 1,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(SnapcubeError::io(created, e)),
            }
            self.known_dirs.insert(created.clone());
        }
        self.known_dirs.insert(dir.to_path_buf());
        Ok(())
    }
}

/// Characters that would split a segment into more than one path component.
#[cfg(windows)]
const SEPARATORS: &[char] = &['/', '\\', ':', '\0'];
#[cfg(not(windows))]
const SEPARATORS: &[char] = &['/', '\0'];

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(SEPARATORS)
}
