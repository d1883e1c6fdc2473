//! HTTP clients for the time-tracking source (Clockify) and the HR
//! destination (BambooHR).
//!
//! Reads share a [`RetryPolicy`]: a request that fails with a 5xx status or
//! a transport error is retried after a fixed delay, up to `max_attempts`
//! attempts in total. 4xx responses fail immediately. Creates are never
//! retried.

mod bamboohr;
mod clockify;

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use thiserror::Error;

pub use bamboohr::{BAMBOOHR_BASE_URL, BambooClient, Employee};
pub use clockify::{CLOCKIFY_BASE_URL, ClockifyClient, ClockifyUser, PAGE_SIZE, Project, Task};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl HttpError {
    /// HTTP status of the failed response, if any.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Bounded retry for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sends the request built by `build`, retrying transient failures.
    ///
    /// Returns the first successful response; non-success statuses are
    /// turned into [`HttpError::Status`].
    pub(crate) async fn send<F>(&self, build: F) -> Result<Response, HttpError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let result = build().send().await;
            let transient = match &result {
                Ok(response) => is_retryable_status(response.status()),
                Err(_) => true,
            };
            if !transient || !self.allows_retry(attempt) {
                return check_status(result?).await;
            }
            match &result {
                Ok(response) => tracing::warn!(
                    status = %response.status(),
                    attempt,
                    "server error, retrying"
                ),
                Err(err) => tracing::warn!(error = %err, attempt, "network error, retrying"),
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

/// Statuses worth retrying: server-side failures only.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}

async fn check_status(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::Status { status, body })
}

fn build_http() -> Result<reqwest::Client, HttpError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(HttpError::ClientBuild)
}

fn validate_api_key(api_key: &str) -> Result<(), HttpError> {
    if api_key.is_empty() {
        return Err(HttpError::InvalidApiKey {
            reason: "API key cannot be empty",
        });
    }
    if api_key.trim().is_empty() {
        return Err(HttpError::InvalidApiKey {
            reason: "API key cannot be whitespace-only",
        });
    }
    Ok(())
}

/// Joins a base URL and an absolute path without doubling the slash.
fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
