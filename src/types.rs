use crate::error::{PathIssue, SnapcubeError};
use serde::{Deserialize, Serialize};

/// How file content is represented in an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// What a capture records for each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Every file with its content.
    #[default]
    Full,
    /// Every text file with its content; binary files are left out.
    IgnoreBinaries,
    /// Paths only.
    StructureOnly,
}

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Base name of the file.
    pub file_name: String,
    /// Containing directory relative to, and including, the snapshot root name.
    /// Always `/`-separated.
    pub file_path: String,
    /// Raw text for `utf-8` entries, Base64 of the raw bytes for `base64` entries.
    pub content: String,
    pub is_binary: bool,
    pub encoding: Encoding,
}

impl Entry {
    /// Classifies and encodes `bytes` into a new entry.
    pub fn from_bytes(
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        bytes: Vec<u8>,
        is_binary: bool,
    ) -> Self {
        let (content, encoding) = crate::codec::encode(bytes, is_binary);
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            content,
            is_binary: encoding == Encoding::Base64,
            encoding,
        }
    }

    /// `filePath/fileName`, the key the manifest is ordered by.
    pub fn relative_path(&self) -> String {
        join_path(&self.file_path, &self.file_name)
    }

    /// Decodes the entry back into the original bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, SnapcubeError> {
        crate::codec::decode(&self.content, self.encoding).map_err(|e| match e {
            SnapcubeError::CorruptManifest { reason, .. } => {
                SnapcubeError::corrupt(self.relative_path(), reason)
            }
            other => other,
        })
    }
}

pub(crate) fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// A snapshot document: full entries, or bare paths in structure-only mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Manifest {
    Entries(Vec<Entry>),
    Paths(Vec<String>),
}

impl Manifest {
    pub fn len(&self) -> usize {
        match self {
            Manifest::Entries(entries) => entries.len(),
            Manifest::Paths(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_structure_only(&self) -> bool {
        matches!(self, Manifest::Paths(_))
    }

    /// All `filePath/fileName` paths, in manifest order.
    pub fn paths(&self) -> Vec<String> {
        match self {
            Manifest::Entries(entries) => entries.iter().map(Entry::relative_path).collect(),
            Manifest::Paths(paths) => paths.clone(),
        }
    }
}

/// What a worker produced for one discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Entry(Entry),
    Path(String),
}

impl Record {
    pub fn relative_path(&self) -> String {
        match self {
            Record::Entry(entry) => entry.relative_path(),
            Record::Path(path) => path.clone(),
        }
    }
}

/// Per-file outcome of a capture worker before assembly.
#[derive(Debug)]
pub(crate) enum Outcome {
    Captured(Record),
    Excluded(String),
    Failed(PathIssue),
}

/// Everything a capture observed besides the manifest itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Files that could not be captured, with the reason.
    pub warnings: Vec<PathIssue>,
    /// Files left out on purpose because of the capture mode.
    pub excluded: Vec<String>,
    /// Number of HTTP requests that were retried.
    pub retries: u32,
}

/// The result of a capture: the manifest plus its report.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Name of the snapshot root (first segment of every `filePath`).
    pub root_name: String,
    pub manifest: Manifest,
    pub report: CaptureReport,
}

/// The result of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub files_written: usize,
    pub directories_created: usize,
    pub failures: Vec<PathIssue>,
}

impl RestoreReport {
    /// Files plus directories created on disk.
    pub fn created(&self) -> usize {
        self.files_written + self.directories_created
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
