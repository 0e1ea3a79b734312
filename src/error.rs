use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapcubeError {
    #[error("Invalid source: {0}")]
    InvalidSource(String),
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),
    #[error("Authentication failed for {url} (HTTP {status})")]
    AuthFailed { url: String, status: u16 },
    #[error("Rate limited by {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },
    #[error("Request to {url} timed out after {attempts} attempts")]
    NetworkTimeout { url: String, attempts: u32 },
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("Corrupt manifest entry '{path}': {reason}")]
    CorruptManifest { path: String, reason: String },
    #[error("Manifest is structure-only and carries no content to restore")]
    StructureOnlyRestoreAttempted,
    #[error("Unsafe path in manifest: {0}")]
    UnsafePath(String),
    #[error("Unsupported file: {0}")]
    Unsupported(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response from {url}: HTTP {status}")]
    Api { url: String, status: u16 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Walk error: {0}")]
    Walk(String),
    #[error("Worker pool error: {0}")]
    Pool(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl SnapcubeError {
    /// Wraps an I/O error, promoting permission failures to [`SnapcubeError::PermissionDenied`].
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return SnapcubeError::PermissionDenied { path };
        }
        SnapcubeError::Io { path, source }
    }

    pub(crate) fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SnapcubeError::CorruptManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapcubeError::InvalidSource(_) => ErrorKind::InvalidSource,
            SnapcubeError::RepositoryNotFound(_) => ErrorKind::RepositoryNotFound,
            SnapcubeError::AuthFailed { .. } => ErrorKind::AuthFailed,
            SnapcubeError::RateLimited { .. } => ErrorKind::RateLimited,
            SnapcubeError::NetworkTimeout { .. } => ErrorKind::NetworkTimeout,
            SnapcubeError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            SnapcubeError::CorruptManifest { .. } | SnapcubeError::Json(_) => {
                ErrorKind::CorruptManifest
            }
            SnapcubeError::StructureOnlyRestoreAttempted => {
                ErrorKind::StructureOnlyRestoreAttempted
            }
            SnapcubeError::UnsafePath(_) => ErrorKind::UnsafePath,
            SnapcubeError::Unsupported(_) => ErrorKind::Unsupported,
            SnapcubeError::Io { .. } | SnapcubeError::Walk(_) | SnapcubeError::Pool(_) => {
                ErrorKind::Io
            }
            SnapcubeError::Http(_) | SnapcubeError::Api { .. } => ErrorKind::Http,
            SnapcubeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a fetch failing with this error may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SnapcubeError::RateLimited { .. } | SnapcubeError::NetworkTimeout { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSource,
    RepositoryNotFound,
    AuthFailed,
    RateLimited,
    NetworkTimeout,
    PermissionDenied,
    CorruptManifest,
    StructureOnlyRestoreAttempted,
    UnsafePath,
    Unsupported,
    Io,
    Http,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidSource => "invalid-source",
            ErrorKind::RepositoryNotFound => "repository-not-found",
            ErrorKind::AuthFailed => "auth-failed",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::NetworkTimeout => "network-timeout",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::CorruptManifest => "corrupt-manifest",
            ErrorKind::StructureOnlyRestoreAttempted => "structure-only-restore",
            ErrorKind::UnsafePath => "unsafe-path",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Io => "io",
            ErrorKind::Http => "http",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem tied to one path, collected instead of aborting the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathIssue {
    /// Manifest-style path (`filePath/fileName`) or host path the issue concerns.
    pub path: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl PathIssue {
    pub fn new(path: impl Into<String>, error: &SnapcubeError) -> Self {
        Self {
            path: path.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
