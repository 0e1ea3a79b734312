//! Blocking API client with timeout, retry and pagination handling.

use crate::error::SnapcubeError;
use crate::options::RemoteOptions;
use crate::pool::CancellationFlag;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LINK, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// A failed attempt that may succeed if repeated.
#[derive(Debug, Clone, Copy)]
enum Transient {
    RateLimited(Option<Duration>),
    Timeout,
    Server(u16),
}

impl Transient {
    fn into_error(self, url: &Url, attempts: u32) -> SnapcubeError {
        let url = url.to_string();
        match self {
            Transient::RateLimited(_) => SnapcubeError::RateLimited { url, attempts },
            Transient::Timeout => SnapcubeError::NetworkTimeout { url, attempts },
            Transient::Server(status) => SnapcubeError::Api { url, status },
        }
    }
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transient::RateLimited(_) => f.write_str("rate limited"),
            Transient::Timeout => f.write_str("timed out"),
            Transient::Server(status) => write!(f, "server error {}", status),
        }
    }
}

enum Verdict {
    Success,
    Retry(Transient),
    Fail(SnapcubeError),
}

/// One platform session. Owns the credential for as long as the fetch runs.
pub(crate) struct ApiClient {
    client: Client,
    options: RemoteOptions,
    retries: AtomicU32,
    cancel: CancellationFlag,
}

impl ApiClient {
    /// Builds a client sending `headers` plus an optional credential header on every request.
    pub(crate) fn new(
        options: &RemoteOptions,
        mut headers: HeaderMap,
        credential: Option<(HeaderName, String)>,
        cancel: CancellationFlag,
    ) -> Result<Self, SnapcubeError> {
        if let Some((name, secret)) = credential {
            let mut value = HeaderValue::from_str(&secret).map_err(|_| {
                SnapcubeError::InvalidSource("token contains characters not allowed in a header".into())
            })?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        let client = Client::builder()
            .user_agent(concat!("snapcube/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            client,
            options: options.clone(),
            retries: AtomicU32::new(0),
            cancel,
        })
    }

    /// Requests retried so far.
    pub(crate) fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SnapcubeError> {
        self.execute(url, |response| response.json::<T>())
            .map(|(value, _)| value)
    }

    pub(crate) fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, SnapcubeError> {
        self.execute(url, |response| response.bytes().map(|b| b.to_vec()))
            .map(|(value, _)| value)
    }

    /// Follows pagination until the listing is exhausted.
    pub(crate) fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &Url,
    ) -> Result<Vec<T>, SnapcubeError> {
        let mut items = Vec::new();
        let mut current = url.clone();
        loop {
            let (page, headers) = self.execute(&current, |response| response.json::<Vec<T>>())?;
            debug!(url = %current, items = page.len(), "Fetched listing page");
            items.extend(page);
            match next_page(&current, &headers) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        Ok(items)
    }

    fn execute<T>(
        &self,
        url: &Url,
        read: impl Fn(Response) -> reqwest::Result<T>,
    ) -> Result<(T, HeaderMap), SnapcubeError> {
        let mut attempt = 0;
        loop {
            self.cancel.check()?;
            attempt += 1;
            let transient = match self.client.get(url.clone()).send() {
                Ok(response) => match classify(url, &response) {
                    Verdict::Success => {
                        let headers = response.headers().clone();
                        match read(response) {
                            Ok(value) => return Ok((value, headers)),
                            Err(e) if e.is_timeout() => Transient::Timeout,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    Verdict::Retry(transient) => transient,
                    Verdict::Fail(error) => return Err(error),
                },
                Err(e) if e.is_timeout() => Transient::Timeout,
                Err(e) => return Err(e.into()),
            };
            if attempt >= self.options.max_attempts {
                return Err(transient.into_error(url, attempt));
            }
            let delay = match transient {
                Transient::RateLimited(Some(wait)) => wait,
                _ => self.backoff(attempt),
            };
            self.retries.fetch_add(1, Ordering::SeqCst);
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Request {}, retrying",
                transient
            );
            self.pause(delay)?;
        }
    }

    /// Exponential wait used when the platform gives no reset time.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        self.options
            .backoff_base
            .saturating_mul(factor)
            .min(self.options.max_backoff)
    }

    fn pause(&self, delay: Duration) -> Result<(), SnapcubeError> {
        let deadline = Instant::now() + delay;
        loop {
            self.cancel.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(PAUSE_SLICE));
        }
    }
}

fn classify(url: &Url, response: &Response) -> Verdict {
    let status = response.status();
    if status.is_success() {
        return Verdict::Success;
    }
    let headers = response.headers();
    let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0")
        || header_str(headers, "ratelimit-remaining") == Some("0");
    match status {
        StatusCode::TOO_MANY_REQUESTS => Verdict::Retry(Transient::RateLimited(reset_wait(headers))),
        StatusCode::FORBIDDEN if exhausted || headers.contains_key(RETRY_AFTER) => {
            Verdict::Retry(Transient::RateLimited(reset_wait(headers)))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Verdict::Fail(SnapcubeError::AuthFailed {
            url: url.to_string(),
            status: status.as_u16(),
        }),
        s if s.is_server_error() => Verdict::Retry(Transient::Server(s.as_u16())),
        s => Verdict::Fail(SnapcubeError::Api {
            url: url.to_string(),
            status: s.as_u16(),
        }),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Time until the platform says the rate limit resets.
fn reset_wait(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }
    let reset = header_str(headers, "x-ratelimit-reset")
        .or_else(|| header_str(headers, "ratelimit-reset"))
        .and_then(|v| v.parse::<u64>().ok())?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(Duration::from_secs(reset.saturating_sub(now)))
}

/// Next page from a `Link: <...>; rel="next"` header, or GitLab's `X-Next-Page`.
fn next_page(current: &Url, headers: &HeaderMap) -> Option<Url> {
    if let Some(link) = headers.get(LINK).and_then(|v| v.to_str().ok()) {
        for part in link.split(',') {
            let mut pieces = part.split(';');
            let target = pieces
                .next()
                .map(str::trim)
                .and_then(|t| t.strip_prefix('<'))
                .and_then(|t| t.strip_suffix('>'));
            let is_next = pieces.any(|p| {
                let p = p.trim();
                p == "rel=\"next\"" || p == "rel=next"
            });
            if let (Some(target), true) = (target, is_next) {
                return current.join(target).ok();
            }
        }
        return None;
    }
    let page = header_str(headers, "x-next-page").filter(|p| !p.is_empty())?;
    let kept: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut next = current.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", page);
    Some(next)
}

/// Appends percent-encoded path segments to an API base URL.
pub(crate) fn api_url(base: &str, segments: &[&str]) -> Result<Url, SnapcubeError> {
    let mut url = Url::parse(base)
        .map_err(|e| SnapcubeError::InvalidSource(format!("API base '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| SnapcubeError::InvalidSource(format!("API base '{}' cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
