//! HTTP fetcher for SWPC products and the Kyoto Dst page.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use swx_engine::{FetchError, RawSample, SampleFetcher, SourceSpec};
use tracing::{debug, instrument, warn};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("swx-monitor/", env!("CARGO_PKG_VERSION"));

/// Client-side request budget. The engine applies its own, usually shorter,
/// per-index timeout on top of this.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches source payloads over HTTP(S).
///
/// The body is returned undecoded; parsing is the ingestor's job.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl SampleFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, source), fields(source = %source.id))]
    async fn fetch_latest(&self, source: &SourceSpec) -> Result<RawSample, FetchError> {
        debug!(url = %source.url, "Fetching source");

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| self.map_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Source returned an error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        let body = response.text().await.map_err(|e| self.map_error(&e))?;
        debug!(bytes = body.len(), "Source fetched");

        Ok(RawSample {
            source_id: source.id.clone(),
            format: source.format,
            body,
            fetched_at: Utc::now(),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("swx-monitor/"));
    }
}
