//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// The service answered with an error status
    #[error("{service} returned {status}: {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Building or sending an email failed
    #[error("Email delivery failed: {0}")]
    Email(String),
}

impl ChannelError {
    /// Map a non-success HTTP response to an error.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(60);
            return Self::RateLimited { retry_after_secs };
        }

        let body = response.text().await.unwrap_or_default();
        Self::Rejected {
            service,
            status: status.as_u16(),
            body,
        }
    }
}
