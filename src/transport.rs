//! HTTP transport with exponential backoff retry logic.
//!
//! Every fetcher talks to the network through the [`Transport`] trait, which
//! exposes the only two request shapes the sources need: a header-only
//! existence check and a full GET.
//!
//! # Architecture
//!
//! - [`Transport`]: Core trait defining async HEAD/GET
//! - [`ReqwestTransport`]: `reqwest::Client` carrying the configured user agent and idle timeout
//! - [`RetryTransport`]: Decorator that adds retry logic to any `Transport` implementation
//!
//! # Retry Strategy
//!
//! - Connection-level errors and 5xx statuses are retried
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! 4xx statuses are answers, not failures, and are returned immediately.

use crate::error::{PageviewError, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Longest body excerpt kept in a [`PageviewError::Transport`].
const ERROR_BODY_PREVIEW: usize = 500;

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert an unexpected response into a [`PageviewError::Transport`].
    pub fn into_error(self) -> PageviewError {
        PageviewError::Transport {
            status: self.status,
            body: truncate_for_log(&self.text(), ERROR_BODY_PREVIEW),
        }
    }
}

/// Trait for async access to the pageview sources.
///
/// Implementors only move bytes; classifying a status as "absent", "skip" or
/// "fatal" is left to the caller.
pub trait Transport {
    /// Issue a HEAD request and return the status code. No body is transferred.
    async fn head(&self, url: &str) -> Result<u16>;

    /// Issue a GET request and return the status code with the full body.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
///
/// The client sends the same descriptive `User-Agent` on every request. The
/// timeout bounds connecting and each read, not the whole transfer: hourly
/// dumps are large, and a slow but steady download must be allowed to finish.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the underlying client.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(user_agent: &str, timeout: StdDuration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip(self))]
    async fn head(&self, url: &str) -> Result<u16> {
        let t0 = Instant::now();
        let status = self.client.head(url).send().await?.status().as_u16();
        debug!(status, elapsed_ms = t0.elapsed().as_millis() as u64, "HEAD complete");
        Ok(status)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(HttpResponse { status, body })
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Transport`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// When retries are exhausted the last outcome is returned unchanged, so a
/// persistent 503 still reaches the caller as a 503.
pub struct RetryTransport<T> {
    /// The underlying transport to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryTransport<T>
where
    T: Transport,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }

    async fn retrying<R, F, Fut>(
        &self,
        method: &'static str,
        url: &str,
        status_of: impl Fn(&R) -> u16,
        mut call: F,
    ) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let outcome = call().await;
            let reason = match &outcome {
                Ok(r) if status_of(r) >= 500 => Some(format!("status {}", status_of(r))),
                Err(e) if e.is_transient() => Some(e.to_string()),
                _ => None,
            };
            let Some(reason) = reason else {
                return outcome;
            };

            attempt += 1;
            if attempt > self.max_retries {
                error!(
                    method,
                    url,
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    reason = %reason,
                    "request exhausted retries"
                );
                return outcome;
            }

            let delay = self.backoff(attempt);
            warn!(
                method,
                url,
                attempt,
                max = self.max_retries,
                ?delay,
                reason = %reason,
                "request failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Transport for RetryTransport<T>
where
    T: Transport,
{
    async fn head(&self, url: &str) -> Result<u16> {
        self.retrying("HEAD", url, |status: &u16| *status, || self.inner.head(url))
            .await
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.retrying("GET", url, |r: &HttpResponse| r.status, || self.inner.get(url))
            .await
    }
}

/// Scripted in-memory transport for exercising fetchers without a network.
#[cfg(test)]
pub(crate) mod mock {
    use super::{HttpResponse, Transport};
    use crate::error::{PageviewError, Result};
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::sync::Mutex;

    /// One scripted answer: a response, or a connection that fails outright.
    #[derive(Debug, Clone)]
    enum Scripted {
        Respond(HttpResponse),
        Fail(io::ErrorKind),
    }

    /// Answers each URL from a queue of scripted outcomes.
    ///
    /// The last outcome queued for a URL is repeated once the queue drains.
    /// Unknown URLs answer 404 with an empty body.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.push(
                url,
                Scripted::Respond(HttpResponse {
                    status,
                    body: body.into(),
                }),
            )
        }

        /// Make requests to `url` fail before any status is received.
        pub fn fail(self, url: &str, kind: io::ErrorKind) -> Self {
            self.push(url, Scripted::Fail(kind))
        }

        /// Every request seen so far, formatted as `"<METHOD> <url>"`.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(self, url: &str, outcome: Scripted) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(outcome);
            self
        }

        fn next(&self, method: &str, url: &str) -> Result<HttpResponse> {
            self.calls.lock().unwrap().push(format!("{method} {url}"));
            let mut routes = self.routes.lock().unwrap();
            let outcome = match routes.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => Scripted::Respond(HttpResponse {
                    status: 404,
                    body: Vec::new(),
                }),
            };
            match outcome {
                Scripted::Respond(response) => Ok(response),
                Scripted::Fail(kind) => Err(PageviewError::Io(io::Error::new(
                    kind,
                    format!("{method} {url}: connection failed"),
                ))),
            }
        }
    }

    impl Transport for MockTransport {
        async fn head(&self, url: &str) -> Result<u16> {
            Ok(self.next("HEAD", url)?.status)
        }

        async fn get(&self, url: &str) -> Result<HttpResponse> {
            self.next("GET", url)
        }
    }
}
