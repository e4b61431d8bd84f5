use async_trait::async_trait;
use thiserror::Error;

/// Outcome of a single failed poster fetch attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: timeouts, connection failures, 5xx and 429 responses
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Retrying will not help: other 4xx responses, bad URLs
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, url: &str) -> Self {
        let message = format!("HTTP {} for {}", status, url);
        if status == 429 || (500..600).contains(&status) {
            FetchError::Transient(message)
        } else {
            FetchError::Permanent(message)
        }
    }
}

/// Fetches the raw bytes of a poster image
#[async_trait]
pub trait PosterFetchPort: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Throttles outgoing requests
#[async_trait]
pub trait RateLimiterPort: Send + Sync {
    async fn acquire(&self);
}
