//! Snapshots of repositories hosted on GitHub or GitLab.
//!
//! Both adapters follow the same three steps: resolve the ref to a commit, list
//! the commit's tree (following pagination to the end), then fetch blob contents
//! on a bounded pool. The resulting records go through the same assembly as a
//! local walk, so a repository and a checkout of it produce the same manifest.

mod github;
mod gitlab;
mod http;

pub use github::GitHubAdapter;
pub use gitlab::GitLabAdapter;

use crate::error::{PathIssue, SnapcubeError};
use crate::manifest;
use crate::options::{BinaryDetection, SnapcubeOptions};
use crate::pool::{CancellationFlag, run_bounded};
use crate::sniff;
use crate::source::{Platform, RemoteRepo};
use crate::types::{Capture, Entry, Mode, Outcome, Record, join_path};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// A platform that can list a repository tree and hand back its files.
pub trait RemoteAdapter {
    /// Captures `repo` in `mode`. The repository's token, if any, is used only
    /// for the requests made during this call.
    fn fetch_tree(&self, repo: &RemoteRepo, mode: Mode) -> Result<Capture, SnapcubeError>;
}

/// The adapter for a platform tag.
pub enum Adapter {
    GitHub(GitHubAdapter),
    GitLab(GitLabAdapter),
}

impl Adapter {
    pub fn for_platform(
        platform: Platform,
        options: &SnapcubeOptions,
        cancel: &CancellationFlag,
    ) -> Self {
        match platform {
            Platform::GitHub => Adapter::GitHub(GitHubAdapter::new(options, cancel.clone())),
            Platform::GitLab => Adapter::GitLab(GitLabAdapter::new(options, cancel.clone())),
        }
    }
}

impl RemoteAdapter for Adapter {
    fn fetch_tree(&self, repo: &RemoteRepo, mode: Mode) -> Result<Capture, SnapcubeError> {
        match self {
            Adapter::GitHub(adapter) => adapter.fetch_tree(repo, mode),
            Adapter::GitLab(adapter) => adapter.fetch_tree(repo, mode),
        }
    }
}

/// Captures a remote repository with the adapter matching its platform.
pub fn fetch_tree(
    repo: &RemoteRepo,
    options: &SnapcubeOptions,
    cancel: &CancellationFlag,
) -> Result<Capture, SnapcubeError> {
    info!(source = %repo, mode = ?options.mode, "Fetching remote tree");
    Adapter::for_platform(repo.platform, options, cancel).fetch_tree(repo, options.mode)
}

/// A file listed in a remote tree.
#[derive(Debug, Clone)]
pub(crate) struct BlobRef {
    /// Repository-relative path.
    pub path: String,
    /// Platform blob id.
    pub id: String,
}

/// Settings shared by the blob stage of both adapters.
pub(crate) struct BlobStage<'a> {
    pub root_name: &'a str,
    pub mode: Mode,
    pub detection: BinaryDetection,
    pub concurrency: usize,
    pub cancel: &'a CancellationFlag,
}

impl BlobStage<'_> {
    /// Fetches blob contents concurrently and turns them into outcomes.
    ///
    /// Per-file failures become warnings. Authentication and exhausted rate
    /// limits abort the whole fetch and stop further requests.
    pub(crate) fn run<F>(&self, blobs: Vec<BlobRef>, fetch: F) -> Result<Vec<Outcome>, SnapcubeError>
    where
        F: Fn(&BlobRef) -> Result<Vec<u8>, SnapcubeError> + Sync,
    {
        let (file_names, file_paths): (Vec<String>, Vec<String>) = blobs
            .iter()
            .map(|blob| place(self.root_name, &blob.path))
            .unzip();
        let relative: Vec<String> = file_paths
            .iter()
            .zip(&file_names)
            .map(|(dir, name)| join_path(dir, name))
            .collect();

        if self.mode == Mode::StructureOnly {
            return Ok(relative
                .into_iter()
                .map(|path| Outcome::Captured(Record::Path(path)))
                .collect());
        }

        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        for (((blob, name), dir), path) in blobs.into_iter().zip(file_names).zip(file_paths).zip(relative) {
            if self.mode == Mode::IgnoreBinaries && sniff::has_binary_extension(&name) {
                debug!(path = %path, "Skipping binary by extension");
                outcomes.push(Outcome::Excluded(path));
            } else {
                pending.push((blob, name, dir, path));
            }
        }
        debug!(blobs = pending.len(), "Fetching blob contents");

        let halted = AtomicBool::new(false);
        let results = run_bounded(pending, self.concurrency, self.cancel, |(blob, name, dir, path)| {
            if halted.load(Ordering::SeqCst) {
                return Err(SnapcubeError::Cancelled);
            }
            match fetch(&blob) {
                Ok(bytes) => {
                    let is_binary = sniff::classify(&name, &bytes, self.detection);
                    if is_binary && self.mode == Mode::IgnoreBinaries {
                        debug!(path = %path, "Skipping binary content");
                        return Ok(Outcome::Excluded(path));
                    }
                    Ok(Outcome::Captured(Record::Entry(Entry::from_bytes(
                        name, dir, bytes, is_binary,
                    ))))
                }
                Err(e) if is_fatal(&e) => {
                    halted.store(true, Ordering::SeqCst);
                    Err(e)
                }
                Err(e) => {
                    warn!(path = %path, "{}", e);
                    Ok(Outcome::Failed(PathIssue::new(path, &e)))
                }
            }
        })?;

        let mut halt_reason = None;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(SnapcubeError::Cancelled) => {}
                Err(e) => {
                    halt_reason.get_or_insert(e);
                }
            }
        }
        match halt_reason {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }
}

fn is_fatal(error: &SnapcubeError) -> bool {
    matches!(
        error,
        SnapcubeError::AuthFailed { .. }
            | SnapcubeError::RateLimited { .. }
            | SnapcubeError::Cancelled
    )
}

/// Splits a repository path into `(fileName, filePath)` under `root_name`.
pub(crate) fn place(root_name: &str, repo_path: &str) -> (String, String) {
    match repo_path.rsplit_once('/') {
        Some((dir, name)) => (name.to_string(), join_path(root_name, dir)),
        None => (repo_path.to_string(), root_name.to_string()),
    }
}

/// Maps a 404/422 on a setup request to [`SnapcubeError::RepositoryNotFound`].
pub(crate) fn missing_as_not_found(repo: &RemoteRepo) -> impl Fn(SnapcubeError) -> SnapcubeError + '_ {
    move |error| match error {
        SnapcubeError::Api { status: 404 | 422, .. } => {
            SnapcubeError::RepositoryNotFound(repo.to_string())
        }
        other => other,
    }
}

/// Assembles remote outcomes into a capture, carrying the retry count.
pub(crate) fn finish(root_name: &str, outcomes: Vec<Outcome>, mode: Mode, retries: u32) -> Capture {
    manifest::assemble(root_name.to_string(), outcomes, mode, retries)
}

pub(crate) fn unsupported(root_name: &str, repo_path: &str, reason: &str) -> Outcome {
    let (name, dir) = place(root_name, repo_path);
    let path = join_path(&dir, &name);
    let error = SnapcubeError::Unsupported(format!("{}: {}", path, reason));
    warn!("{}", error);
    Outcome::Failed(PathIssue::new(path, &error))
}
