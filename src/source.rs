//! Where a snapshot is taken from.

use crate::error::SnapcubeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitHub,
    GitLab,
}

impl Platform {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "github" => Some(Platform::GitHub),
            "gitlab" => Some(Platform::GitLab),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::GitHub => f.write_str("github"),
            Platform::GitLab => f.write_str("gitlab"),
        }
    }
}

/// A hosted repository at an optional ref.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub platform: Platform,
    /// User, organisation, or (GitLab) `group/subgroup` namespace.
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit; `None` means the default branch.
    pub reference: Option<String>,
    pub token: Option<String>,
}

impl RemoteRepo {
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// `owner/repo`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Debug for RemoteRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRepo")
            .field("platform", &self.platform)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("reference", &self.reference)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for RemoteRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.platform, self.owner, self.repo)?;
        if let Some(reference) = &self.reference {
            write!(f, "@{}", reference)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Local(PathBuf),
    Remote(RemoteRepo),
}

impl SourceDescriptor {
    /// Parses `platform:owner/repo[@ref]`, rejecting anything else.
    pub fn parse_remote(input: &str) -> Result<RemoteRepo, SnapcubeError> {
        let invalid = |why: &str| SnapcubeError::InvalidSource(format!("'{}': {}", input, why));
        let (prefix, rest) = input
            .split_once(':')
            .ok_or_else(|| invalid("expected platform:owner/repo[@ref]"))?;
        let platform = Platform::from_prefix(prefix)
            .ok_or_else(|| invalid("platform must be 'github' or 'gitlab'"))?;
        let (slug, reference) = match rest.split_once('@') {
            Some((slug, reference)) if reference.is_empty() => {
                return Err(invalid(&format!("empty ref after '{}@'", slug)));
            }
            Some((slug, reference)) => (slug, Some(reference.to_string())),
            None => (rest, None),
        };
        let (owner, repo) = slug
            .rsplit_once('/')
            .ok_or_else(|| invalid("expected owner/repo"))?;
        if owner.is_empty() || repo.is_empty() || owner.split('/').any(str::is_empty) {
            return Err(invalid("owner and repo must be non-empty"));
        }
        if platform == Platform::GitHub && owner.contains('/') {
            return Err(invalid("GitHub repositories take the form owner/repo"));
        }
        Ok(RemoteRepo {
            platform,
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference,
            token: None,
        })
    }

    /// Default manifest file name for this source.
    pub fn default_output_name(&self, root_name: &str) -> String {
        match self {
            SourceDescriptor::Local(_) => format!("{}.snapcube.json", root_name),
            SourceDescriptor::Remote(remote) => format!(
                "{}_{}.snapcube.json",
                remote.owner.replace('/', "_"),
                remote.repo
            ),
        }
    }
}

impl FromStr for SourceDescriptor {
    type Err = SnapcubeError;

    /// `github:` and `gitlab:` prefixes select a remote source; anything else is a local path.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(SnapcubeError::InvalidSource("empty source".to_string()));
        }
        match input.split_once(':') {
            Some((prefix, _)) if Platform::from_prefix(prefix).is_some() => {
                Self::parse_remote(input).map(SourceDescriptor::Remote)
            }
            _ => Ok(SourceDescriptor::Local(PathBuf::from(input))),
        }
    }
}
