//! # Snapcube
//!
//! `snapcube` captures a directory tree, or a repository hosted on GitHub or GitLab,
//! into one portable JSON manifest, and rebuilds the tree from it byte for byte.
//!
//! Text files are stored verbatim, binary files as Base64. Entries are always sorted
//! by their full relative path, so capturing an unchanged tree twice produces
//! identical JSON. Files are read (or blobs fetched) on a bounded worker pool.
//!
//! # Features
//!
//! - `parallel`: Runs file reads and blob fetches on a Rayon pool (default).
//!
//! # Example
//!
//! ```no_run
//! use snapcube::{CancellationFlag, Mode, SnapcubeBuilder, SourceDescriptor, capture, restore};
//! use std::path::Path;
//!
//! let options = SnapcubeBuilder::new()
//!     .mode(Mode::Full)
//!     .ignore_patterns(vec!["target".into()])
//!     .build();
//! let cancel = CancellationFlag::new();
//!
//! let source: SourceDescriptor = "./my-project".parse().expect("valid source");
//! let snapshot = capture(&source, &options, &cancel).expect("Failed to capture");
//! for issue in &snapshot.report.warnings {
//!     println!("{} {}: {}", issue.kind, issue.path, issue.message);
//! }
//!
//! let report = restore(&snapshot.manifest, Path::new("copy"), &cancel).expect("Failed to restore");
//! println!("created {} files and directories", report.created());
//! ```

pub mod codec;
mod engine;
mod error;
pub mod manifest;
mod options;
mod pool;
pub mod remote;
mod restore;
pub mod sniff;
mod snapshot;
mod source;
mod types;

pub use engine::walk;
pub use error::{ErrorKind, PathIssue, SnapcubeError};
pub use options::{BinaryDetection, RemoteOptions, SnapcubeBuilder, SnapcubeOptions};
pub use pool::CancellationFlag;
pub use restore::{restore, restore_skeleton};
pub use snapshot::{capture, capture_to_file, default_destination, restore_from_file};
pub use source::{Platform, RemoteRepo, SourceDescriptor};
pub use types::{Capture, CaptureReport, Encoding, Entry, Manifest, Mode, Record, RestoreReport};
