use crate::engine;
use crate::error::SnapcubeError;
use crate::manifest;
use crate::options::SnapcubeOptions;
use crate::pool::CancellationFlag;
use crate::remote;
use crate::restore;
use crate::source::SourceDescriptor;
use crate::types::{Capture, RestoreReport};
use std::path::{Path, PathBuf};
use tracing::info;

/// Captures `source` in the mode selected by `options`.
pub fn capture(
    source: &SourceDescriptor,
    options: &SnapcubeOptions,
    cancel: &CancellationFlag,
) -> Result<Capture, SnapcubeError> {
    match source {
        SourceDescriptor::Local(root) => engine::walk(root, options, cancel),
        SourceDescriptor::Remote(repo) => remote::fetch_tree(repo, options, cancel),
    }
}

/// Captures `source` and writes the manifest file.
///
/// `output` defaults to the source's conventional name in the current directory.
/// Nothing is written when the capture fails.
pub fn capture_to_file(
    source: &SourceDescriptor,
    options: &SnapcubeOptions,
    output: Option<&Path>,
    cancel: &CancellationFlag,
) -> Result<(PathBuf, Capture), SnapcubeError> {
    let capture = capture(source, options, cancel)?;
    cancel.check()?;
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(source.default_output_name(&capture.root_name)),
    };
    manifest::write_manifest(&capture.manifest, &path, options.pretty)?;
    info!(
        output = %path.display(),
        entries = capture.manifest.len(),
        warnings = capture.report.warnings.len(),
        "Wrote manifest"
    );
    Ok((path, capture))
}

/// Default restore destination: the manifest's file name without `.snapcube.json`.
pub fn default_destination(manifest_path: &Path) -> PathBuf {
    let name = manifest_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let stem = name
        .strip_suffix(".snapcube.json")
        .or_else(|| name.strip_suffix(".json"))
        .filter(|s| !s.is_empty())
        .unwrap_or(name);
    PathBuf::from(stem)
}

/// Reads the manifest at `manifest_path` and restores it below `destination`.
///
/// With `skeleton` set, a structure-only manifest is restored as empty files;
/// otherwise it is refused.
pub fn restore_from_file(
    manifest_path: &Path,
    destination: Option<&Path>,
    skeleton: bool,
    cancel: &CancellationFlag,
) -> Result<(PathBuf, RestoreReport), SnapcubeError> {
    let manifest = manifest::read_manifest(manifest_path)?;
    let destination = match destination {
        Some(path) => path.to_path_buf(),
        None => default_destination(manifest_path),
    };
    let report = if skeleton && manifest.is_structure_only() {
        restore::restore_skeleton(&manifest, &destination, cancel)?
    } else {
        restore::restore(&manifest, &destination, cancel)?
    };
    Ok((destination, report))
}
