//! In-process HTTP fixture standing in for the GitHub and GitLab APIs.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

#[derive(Clone)]
pub struct Reply {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(String, String)>,
    delay: Duration,
}

impl Reply {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: value.to_string().into_bytes(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            delay: Duration::ZERO,
        }
    }

    pub fn raw(bytes: &[u8]) -> Self {
        Self {
            status: 200,
            body: bytes.to_vec(),
            headers: vec![("Content-Type".into(), "application/octet-stream".into())],
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: b"{\"message\":\"fixture\"}".to_vec(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Hit {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Routes = Arc<Mutex<HashMap<String, VecDeque<Reply>>>>;

/// Serves queued replies per request target (path plus query). The last reply
/// of a queue repeats; unknown targets answer 404.
pub struct FixtureServer {
    pub base: String,
    routes: Routes,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl FixtureServer {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let (thread_routes, thread_hits) = (routes.clone(), hits.clone());
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let routes = thread_routes.clone();
                let hits = thread_hits.clone();
                thread::spawn(move || handle(request, routes, hits));
            }
        });

        Self {
            base: format!("http://127.0.0.1:{}", port),
            routes,
            hits,
        }
    }

    pub fn route(&self, target: &str, replies: Vec<Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(target.to_string(), replies.into_iter().collect());
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, target: &str) -> usize {
        self.hits().iter().filter(|h| h.url == target).count()
    }
}

fn handle(request: Request, routes: Routes, hits: Arc<Mutex<Vec<Hit>>>) {
    let url = request.url().to_string();
    let headers = request
        .headers()
        .iter()
        .map(|h| (h.field.to_string(), h.value.to_string()))
        .collect();
    hits.lock().unwrap().push(Hit {
        url: url.clone(),
        headers,
    });

    let reply = {
        let mut routes = routes.lock().unwrap();
        match routes.get_mut(&url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    }
    .unwrap_or_else(|| Reply::status(404));

    if !reply.delay.is_zero() {
        thread::sleep(reply.delay);
    }
    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    for (name, value) in &reply.headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    let _ = request.respond(response);
}

/// Files shared by the GitHub and GitLab fixture repositories.
pub fn fixture_files() -> Vec<(&'static str, &'static str, Vec<u8>)> {
    vec![
        ("README.md", "b-readme", b"Hello World!\n".to_vec()),
        ("src/main.rs", "b-main", b"fn main() {\n    println!(\"hi\");\n}\n".to_vec()),
        ("src/lib/util.rs", "b-util", b"pub fn util() {}\n".to_vec()),
        ("assets/logo.png", "b-logo", vec![0x89, b'P', b'N', b'G', 0, 1, 2, 255]),
    ]
}

/// Base64 wrapped at 60 columns, as the GitHub blob API returns it.
pub fn wrapped_base64(bytes: &[u8]) -> String {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let mut out = String::new();
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % 60 == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out.push('\n');
    out
}

pub const GITHUB_REPO: &str = "/repos/octocat/hello-world";
pub const GITLAB_PROJECT: &str = "/api/v4/projects/group%2Fhello-world";

/// Routes a GitHub repository whose `main` branch holds [`fixture_files`].
pub fn mount_github(server: &FixtureServer) {
    server.route(
        GITHUB_REPO,
        vec![Reply::json(serde_json::json!({ "default_branch": "main" }))],
    );
    server.route(
        &format!("{}/commits/main", GITHUB_REPO),
        vec![Reply::json(serde_json::json!({
            "sha": "c0ffee",
            "commit": { "tree": { "sha": "root-tree" } }
        }))],
    );
    let mut tree = vec![
        serde_json::json!({ "path": "src", "type": "tree", "sha": "t-src", "mode": "040000" }),
        serde_json::json!({ "path": "src/lib", "type": "tree", "sha": "t-lib", "mode": "040000" }),
        serde_json::json!({ "path": "assets", "type": "tree", "sha": "t-assets", "mode": "040000" }),
    ];
    for (path, sha, bytes) in fixture_files() {
        tree.push(serde_json::json!({
            "path": path, "type": "blob", "sha": sha, "mode": "100644", "size": bytes.len()
        }));
        server.route(
            &format!("{}/git/blobs/{}", GITHUB_REPO, sha),
            vec![Reply::json(serde_json::json!({
                "sha": sha,
                "size": bytes.len(),
                "content": wrapped_base64(&bytes),
                "encoding": "base64"
            }))],
        );
    }
    server.route(
        &format!("{}/git/trees/root-tree?recursive=1", GITHUB_REPO),
        vec![Reply::json(serde_json::json!({
            "sha": "root-tree",
            "tree": tree,
            "truncated": false
        }))],
    );
}

/// Routes a GitLab project `group/hello-world` holding [`fixture_files`], with the
/// tree listing split over two pages.
pub fn mount_gitlab(server: &FixtureServer) {
    server.route(
        GITLAB_PROJECT,
        vec![Reply::json(serde_json::json!({ "id": 42, "default_branch": "main" }))],
    );
    server.route(
        &format!("{}/repository/commits/main", GITLAB_PROJECT),
        vec![Reply::json(serde_json::json!({ "id": "c0ffee" }))],
    );
    let mut items = vec![
        serde_json::json!({ "id": "t-src", "name": "src", "type": "tree", "path": "src", "mode": "040000" }),
    ];
    for (path, id, bytes) in fixture_files() {
        let name = path.rsplit('/').next().unwrap();
        items.push(serde_json::json!({
            "id": id, "name": name, "type": "blob", "path": path, "mode": "100644"
        }));
        server.route(
            &format!("{}/repository/blobs/{}/raw", GITLAB_PROJECT, id),
            vec![Reply::raw(&bytes)],
        );
    }
    let second = items.split_off(3);
    let first_page = format!(
        "{}/repository/tree?ref=c0ffee&recursive=true&per_page=100",
        GITLAB_PROJECT
    );
    let second_page = format!("{}&page=2", first_page);
    server.route(
        &first_page,
        vec![Reply::json(serde_json::Value::Array(items)).header(
            "Link",
            &format!("<{}{}>; rel=\"next\"", server.base, second_page),
        )],
    );
    server.route(&second_page, vec![Reply::json(serde_json::Value::Array(second))]);
}
