use crate::error::{PathIssue, SnapcubeError};
use crate::manifest;
use crate::options::{BinaryDetection, SnapcubeOptions};
use crate::pool::{CancellationFlag, run_bounded};
use crate::sniff;
use crate::types::{Capture, Entry, Mode, Outcome, Record, join_path};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Version-control metadata directories that never belong in a snapshot.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

struct Walker {
    inner: ignore::Walk,
}

impl Walker {
    fn new(root: &Path, options: &SnapcubeOptions) -> Result<Self, SnapcubeError> {
        let mut builder = WalkBuilder::new(root);
        builder
            .git_ignore(options.respect_gitignore)
            .git_exclude(options.respect_gitignore)
            .git_global(options.respect_gitignore)
            .parents(options.respect_gitignore)
            .hidden(!options.include_hidden)
            .max_depth(options.max_depth)
            .follow_links(options.follow_links)
            .ignore(false);
        let matcher = if !options.ignore_patterns.is_empty() {
            let mut glob_builder = globset::GlobSetBuilder::new();
            for pattern in &options.ignore_patterns {
                let glob = globset::Glob::new(pattern).map_err(|e| {
                    SnapcubeError::Walk(format!("Invalid glob pattern '{}': {}", pattern, e))
                })?;
                glob_builder.add(glob);
            }
            Some(
                glob_builder
                    .build()
                    .map_err(|e| SnapcubeError::Walk(format!("Failed to build glob set: {}", e)))?,
            )
        } else {
            None
        };
        let root = root.to_path_buf();
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if is_dir && VCS_DIRS.iter().any(|d| entry.file_name() == *d) {
                return false;
            }
            match &matcher {
                Some(matcher) => {
                    let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                    !(matcher.is_match(relative) || matcher.is_match(entry.file_name()))
                }
                None => true,
            }
        });
        Ok(Self {
            inner: builder.build(),
        })
    }
}

/// A regular file found by the walker, already placed in manifest coordinates.
struct Discovered {
    path: PathBuf,
    file_name: String,
    file_path: String,
}

/// Captures the directory at `root` into a sorted manifest.
///
/// A missing or non-directory root fails with [`SnapcubeError::InvalidSource`]
/// before anything is read. Unreadable files are reported in the capture's
/// warnings and left out of the manifest.
pub fn walk(
    root: &Path,
    options: &SnapcubeOptions,
    cancel: &CancellationFlag,
) -> Result<Capture, SnapcubeError> {
    let root_name = root_name(root)?;
    info!(root = %root.display(), mode = ?options.mode, "Walking local tree");

    let mut outcomes = Vec::new();
    let mut files = Vec::new();
    for result in Walker::new(root, options)?.inner {
        cancel.check()?;
        match result {
            Ok(entry) if entry.depth() == 0 => {}
            Ok(entry) => match entry.file_type() {
                Some(t) if t.is_dir() => {}
                Some(t) if t.is_file() => match locate(root, &root_name, entry.path()) {
                    Some(found) => files.push(found),
                    None => outcomes.push(unsupported(entry.path(), "file name is not valid UTF-8")),
                },
                _ => outcomes.push(unsupported(entry.path(), "not a regular file")),
            },
            Err(e) => outcomes.push(walk_issue(root, &e)),
        }
    }
    debug!(files = files.len(), "Discovered files");

    let mode = options.mode;
    let detection = options.binary_detection;
    let captured = run_bounded(files, options.workers, cancel, |file| {
        capture_file(file, mode, detection)
    })?;
    outcomes.extend(captured);

    Ok(manifest::assemble(root_name, outcomes, mode, 0))
}

fn root_name(root: &Path) -> Result<String, SnapcubeError> {
    let metadata = fs::metadata(root).map_err(|e| {
        SnapcubeError::InvalidSource(format!("{}: {}", root.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(SnapcubeError::InvalidSource(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let canonical = fs::canonicalize(root).map_err(|e| SnapcubeError::io(root, e))?;
    match canonical.file_name() {
        Some(name) => name.to_str().map(str::to_string).ok_or_else(|| {
            SnapcubeError::InvalidSource(format!(
                "{}: directory name is not valid UTF-8",
                root.display()
            ))
        }),
        None => Ok("root".to_string()),
    }
}

fn locate(root: &Path, root_name: &str, path: &Path) -> Option<Discovered> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = vec![root_name.to_string()];
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    let file_name = segments.pop()?;
    Some(Discovered {
        path: path.to_path_buf(),
        file_name,
        file_path: segments.join("/"),
    })
}

fn capture_file(file: Discovered, mode: Mode, detection: BinaryDetection) -> Outcome {
    let relative = join_path(&file.file_path, &file.file_name);
    if mode == Mode::StructureOnly {
        return Outcome::Captured(Record::Path(relative));
    }
    if mode == Mode::IgnoreBinaries && sniff::has_binary_extension(&file.file_name) {
        debug!(path = %relative, "Skipping binary by extension");
        return Outcome::Excluded(relative);
    }
    let bytes = match fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = SnapcubeError::io(&file.path, e);
            warn!(path = %relative, "{}", error);
            return Outcome::Failed(PathIssue::new(relative, &error));
        }
    };
    let is_binary = sniff::classify(&file.file_name, &bytes, detection);
    if is_binary && mode == Mode::IgnoreBinaries {
        debug!(path = %relative, "Skipping binary content");
        return Outcome::Excluded(relative);
    }
    Outcome::Captured(Record::Entry(Entry::from_bytes(
        file.file_name,
        file.file_path,
        bytes,
        is_binary,
    )))
}

fn unsupported(path: &Path, reason: &str) -> Outcome {
    let error = SnapcubeError::Unsupported(format!("{}: {}", path.display(), reason));
    warn!("{}", error);
    Outcome::Failed(PathIssue::new(path.display().to_string(), &error))
}

fn walk_issue(root: &Path, error: &ignore::Error) -> Outcome {
    let path = error_path(error).unwrap_or(root);
    let converted = match error.io_error() {
        Some(io) => SnapcubeError::io(path, std::io::Error::new(io.kind(), io.to_string())),
        None => SnapcubeError::Walk(error.to_string()),
    };
    warn!(path = %path.display(), "{}", converted);
    Outcome::Failed(PathIssue::new(path.display().to_string(), &converted))
}

fn error_path(error: &ignore::Error) -> Option<&Path> {
    match error {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        _ => None,
    }
}
