use crate::app::ports::{FetchError, PosterFetchPort};
use async_trait::async_trait;
use std::time::Duration;

/// Poster fetcher backed by a shared `reqwest::Client`
pub struct ReqwestPosterFetcher {
    client: reqwest::Client,
}

impl ReqwestPosterFetcher {
    pub fn new(timeout: Duration) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("movie-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Permanent(err.to_string())
    }
}

#[async_trait]
impl PosterFetchPort for ReqwestPosterFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), url));
        }
        let bytes = resp.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_timeout() {
        assert!(ReqwestPosterFetcher::new(Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_permanent() {
        let fetcher = ReqwestPosterFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
