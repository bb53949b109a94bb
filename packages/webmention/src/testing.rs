//! Mock collaborators for tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use url::Url;

use crate::admin::{Credentials, IdentityVerifier};
use crate::error::FetchError;
use crate::fetch::{Fetched, HttpFetcher};

#[derive(Debug, Clone)]
enum Canned {
    Response { status: u16, body: Vec<u8> },
    Timeout,
}

/// Fetcher serving canned responses.
///
/// Unknown URLs answer `404`. Every requested URL is recorded.
///
/// # Example
///
/// ```rust
/// use webmention::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.add_html("https://example.org/post", "<a href='https://bitworking.org/'>hi</a>");
/// ```
#[derive(Default, Clone)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, Canned>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, url: &str, status: u16, body: Vec<u8>) {
        self.responses
            .write()
            .unwrap()
            .insert(normalize(url), Canned::Response { status, body });
    }

    /// Serve `html` with status 200.
    pub fn add_html(&self, url: &str, html: &str) {
        self.add_response(url, 200, html.as_bytes().to_vec());
    }

    /// Make requests for `url` time out.
    pub fn add_timeout(&self, url: &str) {
        self.responses
            .write()
            .unwrap()
            .insert(normalize(url), Canned::Timeout);
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpFetcher for MockFetcher {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<Fetched, FetchError> {
        self.calls.write().unwrap().push(url.to_string());

        let canned = self.responses.read().unwrap().get(url.as_str()).cloned();
        let (status, body) = match canned {
            Some(Canned::Response { status, body }) => (status, body),
            Some(Canned::Timeout) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            }
            None => (404, b"not found".to_vec()),
        };

        if body.len() > max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }

        Ok(Fetched {
            status,
            final_url: url.clone(),
            content_type: None,
            body,
        })
    }
}

/// Identity verifier with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticVerifier {
    pub admin: bool,
}

impl StaticVerifier {
    pub fn admin() -> Self {
        Self { admin: true }
    }

    pub fn anyone() -> Self {
        Self { admin: false }
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn is_admin(&self, _credentials: &Credentials) -> bool {
        self.admin
    }
}

/// A `width` x `height` PNG gradient.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
