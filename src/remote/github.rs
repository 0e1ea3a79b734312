use super::http::{ApiClient, api_url};
use super::{BlobRef, BlobStage, RemoteAdapter, finish, missing_as_not_found, unsupported};
use crate::codec;
use crate::error::SnapcubeError;
use crate::options::{BinaryDetection, RemoteOptions, SnapcubeOptions};
use crate::pool::CancellationFlag;
use crate::source::RemoteRepo;
use crate::types::{Capture, Mode, Outcome};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    tree: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeListing {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Blob {
    content: String,
    encoding: String,
}

/// GitHub REST adapter (`/repos/{owner}/{repo}/...`).
pub struct GitHubAdapter {
    options: RemoteOptions,
    detection: BinaryDetection,
    cancel: CancellationFlag,
}

impl GitHubAdapter {
    pub fn new(options: &SnapcubeOptions, cancel: CancellationFlag) -> Self {
        Self {
            options: options.remote.clone(),
            detection: options.binary_detection,
            cancel,
        }
    }

    fn client(&self, repo: &RemoteRepo) -> Result<ApiClient, SnapcubeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static("2022-11-28"),
        );
        let credential = repo
            .token
            .as_ref()
            .map(|token| (AUTHORIZATION, format!("Bearer {}", token)));
        ApiClient::new(&self.options, headers, credential, self.cancel.clone())
    }

    fn endpoint(&self, repo: &RemoteRepo, segments: &[&str]) -> Result<Url, SnapcubeError> {
        let mut path = vec!["repos", repo.owner.as_str(), repo.repo.as_str()];
        path.extend_from_slice(segments);
        api_url(&self.options.github_api, &path)
    }

    /// Lists every blob below `tree_sha`, re-listing level by level if GitHub truncates.
    fn list_tree(
        &self,
        client: &ApiClient,
        repo: &RemoteRepo,
        tree_sha: &str,
    ) -> Result<(Vec<BlobRef>, Vec<Outcome>), SnapcubeError> {
        let mut url = self.endpoint(repo, &["git", "trees", tree_sha])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let listing: TreeListing = client
            .get_json(&url)
            .map_err(missing_as_not_found(repo))?;
        if !listing.truncated {
            return Ok(self.split_items(repo, String::new(), listing.tree));
        }

        warn!(source = %repo, "Recursive tree listing truncated, listing directories one by one");
        let mut blobs = Vec::new();
        let mut skipped = Vec::new();
        let mut pending = vec![(String::new(), tree_sha.to_string())];
        while let Some((prefix, sha)) = pending.pop() {
            self.cancel.check()?;
            let url = self.endpoint(repo, &["git", "trees", sha.as_str()])?;
            let level: TreeListing = client.get_json(&url)?;
            for item in &level.tree {
                if item.kind == "tree" {
                    pending.push((prefixed(&prefix, &item.path), item.sha.clone()));
                }
            }
            let (level_blobs, level_skipped) = self.split_items(repo, prefix, level.tree);
            blobs.extend(level_blobs);
            skipped.extend(level_skipped);
        }
        Ok((blobs, skipped))
    }

    fn split_items(
        &self,
        repo: &RemoteRepo,
        prefix: String,
        items: Vec<TreeItem>,
    ) -> (Vec<BlobRef>, Vec<Outcome>) {
        let mut blobs = Vec::new();
        let mut skipped = Vec::new();
        for item in items {
            let path = prefixed(&prefix, &item.path);
            match item.kind.as_str() {
                "blob" => blobs.push(BlobRef { path, id: item.sha }),
                "commit" => skipped.push(unsupported(&repo.repo, &path, "submodule")),
                _ => {}
            }
        }
        (blobs, skipped)
    }

    fn fetch_blob(
        &self,
        client: &ApiClient,
        repo: &RemoteRepo,
        blob: &BlobRef,
    ) -> Result<Vec<u8>, SnapcubeError> {
        let url = self.endpoint(repo, &["git", "blobs", blob.id.as_str()])?;
        let body: Blob = client.get_json(&url)?;
        if body.encoding == "base64" {
            codec::decode_wrapped(&body.content).map_err(|e| {
                SnapcubeError::Unsupported(format!("{}: undecodable blob content: {}", blob.path, e))
            })
        } else {
            Ok(body.content.into_bytes())
        }
    }
}

impl RemoteAdapter for GitHubAdapter {
    fn fetch_tree(&self, repo: &RemoteRepo, mode: Mode) -> Result<Capture, SnapcubeError> {
        let client = self.client(repo)?;
        let not_found = missing_as_not_found(repo);

        let reference = match &repo.reference {
            Some(reference) => reference.clone(),
            None => {
                let info: RepoInfo = client
                    .get_json(&self.endpoint(repo, &[])?)
                    .map_err(&not_found)?;
                info.default_branch
            }
        };
        let commit: CommitInfo = client
            .get_json(&self.endpoint(repo, &["commits", reference.as_str()])?)
            .map_err(&not_found)?;
        debug!(source = %repo, commit = %commit.sha, "Resolved ref");

        let (blobs, mut outcomes) = self.list_tree(&client, repo, &commit.commit.tree.sha)?;
        let stage = BlobStage {
            root_name: &repo.repo,
            mode,
            detection: self.detection,
            concurrency: self.options.concurrency,
            cancel: &self.cancel,
        };
        outcomes.extend(stage.run(blobs, |blob| self.fetch_blob(&client, repo, blob))?);
        Ok(finish(&repo.repo, outcomes, mode, client.retries()))
    }
}

fn prefixed(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}
