//! HTTP retrieval of source pages and author photos.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// User agent sent with every request.
pub const USER_AGENT: &str = "webmention-verifier/0.1 (+https://www.w3.org/TR/webmention/)";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetched response. The body is never larger than the cap it was fetched with.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    /// URL after redirects.
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn non-2xx responses into `FetchError::Status`.
    pub fn ensure_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: self.final_url.to_string(),
                status: self.status,
            })
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fetches one URL, reading at most `max_bytes` of body.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<Fetched, FetchError>;
}

/// `reqwest` backed fetcher.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Use a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<Fetched, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }

        debug!(url = %url, "HTTP fetch starting");
        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            transport(url, e)
        })?;

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: max_bytes,
        };

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > max_bytes) {
            warn!(url = %url, declared = ?declared, limit = max_bytes, "declared body too large");
            return Err(too_large());
        }

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut body = Vec::with_capacity(declared.unwrap_or(0).min(max_bytes));
        while let Some(chunk) = response.chunk().await.map_err(|e| transport(url, e))? {
            if body.len() + chunk.len() > max_bytes {
                warn!(url = %url, limit = max_bytes, "body exceeded cap");
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status, bytes = body.len(), "HTTP fetch complete");
        Ok(Fetched {
            status,
            final_url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(status: u16) -> Fetched {
        Fetched {
            status,
            final_url: Url::parse("https://example.org/").unwrap(),
            content_type: None,
            body: b"hi".to_vec(),
        }
    }

    #[test]
    fn test_ensure_success() {
        assert!(fetched(200).ensure_success().is_ok());
        assert!(fetched(204).ensure_success().is_ok());
        assert!(matches!(
            fetched(404).ensure_success(),
            Err(FetchError::Status { status: 404, .. })
        ));
        assert!(matches!(
            fetched(301).ensure_success(),
            Err(FetchError::Status { status: 301, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let fetcher = ReqwestFetcher::new(DEFAULT_TIMEOUT).unwrap();
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(matches!(
            fetcher.get(&url, 1024).await,
            Err(FetchError::UnsupportedUrl(_))
        ));
    }
}
