use super::http::{ApiClient, api_url};
use super::{BlobRef, BlobStage, RemoteAdapter, finish, missing_as_not_found, unsupported};
use crate::error::SnapcubeError;
use crate::options::{BinaryDetection, RemoteOptions, SnapcubeOptions};
use crate::pool::CancellationFlag;
use crate::source::RemoteRepo;
use crate::types::{Capture, Mode};
use reqwest::header::{HeaderMap, HeaderName};
use serde::Deserialize;
use tracing::debug;
use url::Url;

const PER_PAGE: &str = "100";

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    id: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// GitLab REST v4 adapter (`/projects/{namespace%2Frepo}/repository/...`).
pub struct GitLabAdapter {
    options: RemoteOptions,
    detection: BinaryDetection,
    cancel: CancellationFlag,
}

impl GitLabAdapter {
    pub fn new(options: &SnapcubeOptions, cancel: CancellationFlag) -> Self {
        Self {
            options: options.remote.clone(),
            detection: options.binary_detection,
            cancel,
        }
    }

    fn client(&self, repo: &RemoteRepo) -> Result<ApiClient, SnapcubeError> {
        let credential = repo
            .token
            .as_ref()
            .map(|token| (HeaderName::from_static("private-token"), token.clone()));
        ApiClient::new(&self.options, HeaderMap::new(), credential, self.cancel.clone())
    }

    /// Project endpoint; the `namespace/repo` id travels as one encoded segment.
    fn endpoint(&self, repo: &RemoteRepo, segments: &[&str]) -> Result<Url, SnapcubeError> {
        let id = repo.full_name();
        let mut path = vec!["projects", id.as_str()];
        path.extend_from_slice(segments);
        api_url(&self.options.gitlab_api, &path)
    }
}

impl RemoteAdapter for GitLabAdapter {
    fn fetch_tree(&self, repo: &RemoteRepo, mode: Mode) -> Result<Capture, SnapcubeError> {
        let client = self.client(repo)?;
        let not_found = missing_as_not_found(repo);

        let reference = match &repo.reference {
            Some(reference) => reference.clone(),
            None => {
                let info: ProjectInfo = client
                    .get_json(&self.endpoint(repo, &[])?)
                    .map_err(&not_found)?;
                info.default_branch.ok_or_else(|| {
                    SnapcubeError::RepositoryNotFound(format!("{} has no default branch", repo))
                })?
            }
        };
        let commit: CommitInfo = client
            .get_json(&self.endpoint(repo, &["repository", "commits", reference.as_str()])?)
            .map_err(&not_found)?;
        debug!(source = %repo, commit = %commit.id, "Resolved ref");

        let mut url = self.endpoint(repo, &["repository", "tree"])?;
        url.query_pairs_mut()
            .append_pair("ref", &commit.id)
            .append_pair("recursive", "true")
            .append_pair("per_page", PER_PAGE);
        let items: Vec<TreeItem> = client.get_paginated(&url).map_err(&not_found)?;

        let mut blobs = Vec::new();
        let mut outcomes = Vec::new();
        for item in items {
            match item.kind.as_str() {
                "blob" => blobs.push(BlobRef {
                    path: item.path,
                    id: item.id,
                }),
                "commit" => outcomes.push(unsupported(&repo.repo, &item.path, "submodule")),
                _ => {}
            }
        }

        let stage = BlobStage {
            root_name: &repo.repo,
            mode,
            detection: self.detection,
            concurrency: self.options.concurrency,
            cancel: &self.cancel,
        };
        outcomes.extend(stage.run(blobs, |blob| {
            let url = self.endpoint(repo, &["repository", "blobs", blob.id.as_str(), "raw"])?;
            client.get_bytes(&url)
        })?);
        Ok(finish(&repo.repo, outcomes, mode, client.retries()))
    }
}
