use crate::types::Mode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BinaryDetection {
    /// NUL byte within the sniffed prefix.
    #[default]
    Simple,
    /// `content_inspector` heuristics over the sniffed prefix.
    Accurate,
}

/// Settings for the GitHub and GitLab adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOptions {
    pub github_api: String,
    pub gitlab_api: String,
    /// Maximum blob requests in flight.
    pub concurrency: usize,
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
    /// Ceiling for the exponential backoff; platform reset times are honoured in full.
    pub max_backoff: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".to_string(),
            gitlab_api: "https://gitlab.com/api/v4".to_string(),
            concurrency: 8,
            max_attempts: 5,
            timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapcubeOptions {
    pub mode: Mode,
    pub respect_gitignore: bool,
    pub max_depth: Option<usize>,
    pub include_hidden: bool,
    pub follow_links: bool,
    pub ignore_patterns: Vec<String>,
    pub binary_detection: BinaryDetection,
    pub workers: usize,
    pub pretty: bool,
    pub remote: RemoteOptions,
}

impl Default for SnapcubeOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Full,
            respect_gitignore: false,
            max_depth: None,
            include_hidden: true,
            follow_links: false,
            ignore_patterns: Vec::new(),
            binary_detection: BinaryDetection::Simple,
            workers: 8,
            pretty: true,
            remote: RemoteOptions::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapcubeBuilder {
    options: SnapcubeOptions,
}

impl SnapcubeBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn mode(mut self, mode: Mode) -> Self {
        self.options.mode = mode;
        self
    }
    pub fn respect_gitignore(mut self, yes: bool) -> Self {
        self.options.respect_gitignore = yes;
        self
    }
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = Some(depth);
        self
    }
    pub fn no_limit_depth(mut self) -> Self {
        self.options.max_depth = None;
        self
    }
    pub fn include_hidden(mut self, yes: bool) -> Self {
        self.options.include_hidden = yes;
        self
    }
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.options.follow_links = yes;
        self
    }
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.options.ignore_patterns = patterns;
        self
    }
    pub fn binary_detection(mut self, method: BinaryDetection) -> Self {
        self.options.binary_detection = method;
        self
    }
    pub fn workers(mut self, workers: usize) -> Self {
        self.options.workers = workers.max(1);
        self
    }
    pub fn pretty(mut self, yes: bool) -> Self {
        self.options.pretty = yes;
        self
    }
    pub fn github_api(mut self, base: impl Into<String>) -> Self {
        self.options.remote.github_api = base.into();
        self
    }
    pub fn gitlab_api(mut self, base: impl Into<String>) -> Self {
        self.options.remote.gitlab_api = base.into();
        self
    }
    pub fn remote_concurrency(mut self, limit: usize) -> Self {
        self.options.remote.concurrency = limit.max(1);
        self
    }
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.options.remote.max_attempts = attempts.max(1);
        self
    }
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.remote.timeout = timeout;
        self
    }
    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.options.remote.backoff_base = base;
        self.options.remote.max_backoff = max;
        self
    }
    pub fn build(self) -> SnapcubeOptions {
        self.options
    }
}
