use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::attempts::{plan_attempts, FetchAttempt, HttpClients, DEFAULT_ACCEPT_LANGUAGE};
use super::candidates::resolve_candidates;
use super::parser::{parse_feed, ParseError, UnifiedItem};

/// Per-attempt timeout covering connect, headers and body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, malformed URL, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Any response status other than 200
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// The attempt exceeded its timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

/// The single error a caller sees for one feed request.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The URL was empty or whitespace
    #[error("url is required")]
    InvalidInput,
    /// Every attempt failed before a body was received; carries the last failure
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// At least one body was received but none parsed into items
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Knobs for fetching, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_feed_size: usize,
    pub accept_language: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// Fetches a feed URL and normalizes it into [`UnifiedItem`]s.
///
/// Tries every candidate URL (see [`resolve_candidates`]) with every planned
/// attempt (see [`plan_attempts`]) in order, stopping at the first response
/// that parses into at least one item.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    clients: HttpClients,
    options: FetchOptions,
}

impl FeedFetcher {
    /// Builds a fetcher with a direct client and an optional pre-built proxy client.
    ///
    /// The direct client ignores system proxy variables so "direct" stays direct.
    pub fn new(
        options: FetchOptions,
        proxy: Option<reqwest::Client>,
    ) -> Result<Self, reqwest::Error> {
        let direct = reqwest::Client::builder()
            .timeout(options.timeout)
            .no_proxy()
            .build()?;
        Ok(Self::with_clients(HttpClients { direct, proxy }, options))
    }

    pub fn with_clients(clients: HttpClients, options: FetchOptions) -> Self {
        Self { clients, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetches and parses `url`.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidInput`] - `url` is blank
    /// - [`FeedError::Fetch`] - no attempt ever got a 200 response; the most
    ///   recent attempt's error is returned
    /// - [`FeedError::Parse`] - some attempt got a body, but nothing parsed
    ///   into items
    pub async fn fetch(&self, url: &str) -> Result<Vec<UnifiedItem>, FeedError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FeedError::InvalidInput);
        }

        let mut last_fetch_error: Option<FetchError> = None;
        let mut received_body = false;

        for candidate in resolve_candidates(url) {
            let attempts = plan_attempts(&candidate, &self.clients, &self.options.accept_language);
            for (index, attempt) in attempts.iter().enumerate() {
                match execute(attempt, &candidate, &self.options).await {
                    Ok(body) => {
                        received_body = true;
                        match parse_feed(&body) {
                            Ok(items) => {
                                tracing::debug!(
                                    url = %candidate,
                                    attempt = index + 1,
                                    transport = ?attempt.transport,
                                    items = items.len(),
                                    "Feed fetched"
                                );
                                return Ok(items);
                            }
                            Err(e) => {
                                tracing::debug!(
                                    url = %candidate,
                                    attempt = index + 1,
                                    bytes = body.len(),
                                    error = %e,
                                    "Response did not parse as a feed"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(
                            url = %candidate,
                            attempt = index + 1,
                            transport = ?attempt.transport,
                            error = %e,
                            "Fetch attempt failed"
                        );
                        last_fetch_error = Some(e);
                    }
                }
            }
        }

        Err(match last_fetch_error {
            Some(e) if !received_body => FeedError::Fetch(e),
            _ => FeedError::Parse(ParseError),
        })
    }
}

/// Performs one GET attempt and returns the body of a 200 response.
///
/// The whole exchange (connect, headers, body) is bounded by `options.timeout`.
/// The response is dropped, releasing its connection, on every return path.
pub async fn execute(
    attempt: &FetchAttempt,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let request = attempt.client.get(url).headers(attempt.headers.clone());

    let exchange = async {
        let response = request.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        read_limited_bytes(response, options.max_feed_size).await
    };

    tokio::time::timeout(options.timeout, exchange)
        .await
        .map_err(|_| FetchError::Timeout(options.timeout))?
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        // SEC-003: saturating_add prevents integer overflow in the size check
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
