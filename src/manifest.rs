//! Manifest assembly, serialization and file IO.

use crate::error::SnapcubeError;
use crate::types::{Capture, CaptureReport, Entry, Manifest, Mode, Outcome, Record};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Orders records by full relative path and shapes them for `mode`.
///
/// The sort happens here regardless of what upstream did, so the ordering
/// invariant never depends on worker scheduling. Exact duplicate paths keep
/// their first record.
pub fn build(records: Vec<Record>, mode: Mode) -> Manifest {
    let mut keyed: Vec<(String, Record)> = records
        .into_iter()
        .map(|record| (record.relative_path(), record))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);

    match mode {
        Mode::StructureOnly => Manifest::Paths(keyed.into_iter().map(|(path, _)| path).collect()),
        Mode::Full | Mode::IgnoreBinaries => Manifest::Entries(
            keyed
                .into_iter()
                .filter_map(|(_, record)| match record {
                    Record::Entry(entry) => Some(entry),
                    Record::Path(_) => None,
                })
                .filter(|entry: &Entry| mode == Mode::Full || !entry.is_binary)
                .collect(),
        ),
    }
}

/// Splits worker outcomes into the manifest and its report.
pub(crate) fn assemble(
    root_name: String,
    outcomes: Vec<Outcome>,
    mode: Mode,
    retries: u32,
) -> Capture {
    let mut records = Vec::with_capacity(outcomes.len());
    let mut report = CaptureReport {
        retries,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Captured(record) => records.push(record),
            Outcome::Excluded(path) => report.excluded.push(path),
            Outcome::Failed(issue) => report.warnings.push(issue),
        }
    }
    report.excluded.sort();
    report.warnings.sort_by(|a, b| a.path.cmp(&b.path));
    let manifest = build(records, mode);
    debug!(
        entries = manifest.len(),
        excluded = report.excluded.len(),
        warnings = report.warnings.len(),
        "Assembled manifest"
    );
    Capture {
        root_name,
        manifest,
        report,
    }
}

/// Serializes a manifest to JSON bytes.
pub fn serialize(manifest: &Manifest, pretty: bool) -> Result<Vec<u8>, SnapcubeError> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(manifest)?
    } else {
        serde_json::to_vec(manifest)?
    };
    Ok(bytes)
}

/// Parses a manifest document.
pub fn parse(bytes: &[u8]) -> Result<Manifest, SnapcubeError> {
    serde_json::from_slice(bytes)
        .map_err(|e| SnapcubeError::corrupt("<manifest>", e.to_string()))
}

/// Writes the manifest to `path`, replacing any existing file atomically.
pub fn write_manifest(
    manifest: &Manifest,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), SnapcubeError> {
    let path = path.as_ref();
    let bytes = serialize(manifest, pretty)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SnapcubeError::io(dir, e))?;
    temp.write_all(&bytes)
        .map_err(|e| SnapcubeError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| SnapcubeError::io(path, e.error))?;
    Ok(())
}

/// Reads and parses a manifest file.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Manifest, SnapcubeError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| SnapcubeError::io(path, e))?;
    parse(&bytes)
}
