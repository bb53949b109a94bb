//! Author photo thumbnails, stored content-addressed.

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docstore::{DocumentStore, DocumentStoreExt};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::GenericImageView;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;
use url::Url;

use crate::error::EnrichmentError;
use crate::fetch::HttpFetcher;

/// Document kind thumbnails are stored under.
pub const THUMBNAIL_KIND: &str = "Thumbnail";

/// Length of the longer side of a thumbnail, in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 32;

/// Largest photo download accepted.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// A stored thumbnail. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub png: Vec<u8>,
}

fn to_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(d)?;
    STANDARD
        .decode(encoded)
        .map_err(serde::de::Error::custom)
}

/// Hex md5 of encoded thumbnail bytes.
pub fn thumbnail_id(png: &[u8]) -> String {
    format!("{:x}", md5::compute(png))
}

/// Decode `bytes` (PNG, JPEG or GIF), scale so the longer side is `size`
/// pixels keeping the aspect ratio, and re-encode as maximally compressed PNG.
pub fn make_thumbnail(bytes: &[u8], size: u32) -> Result<Vec<u8>, EnrichmentError> {
    if size == 0 {
        return Err(EnrichmentError::InvalidSize);
    }
    let img = image::load_from_memory(bytes).map_err(EnrichmentError::Decode)?;
    let (width, height) = img.dimensions();
    let (w, h) = if width > height {
        (size, scaled(height, size, width))
    } else {
        (scaled(width, size, height), size)
    };

    let resized = img.resize_exact(w, h, FilterType::Lanczos3);

    let mut png = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut png),
        CompressionType::Best,
        PngFilter::Adaptive,
    );
    resized
        .write_with_encoder(encoder)
        .map_err(EnrichmentError::Encode)?;
    Ok(png)
}

/// `short * size / long`, rounded, never zero.
fn scaled(short: u32, size: u32, long: u32) -> u32 {
    if long == 0 {
        return size;
    }
    let v = (u64::from(short) * u64::from(size) + u64::from(long) / 2) / u64::from(long);
    v.clamp(1, u64::from(size)) as u32
}

/// Fetches author photos and stores their thumbnails.
pub struct ThumbnailEnricher {
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn HttpFetcher>,
    size: u32,
    max_bytes: usize,
}

impl ThumbnailEnricher {
    pub fn new(store: Arc<dyn DocumentStore>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            store,
            fetcher,
            size: DEFAULT_THUMBNAIL_SIZE,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetch, resize and store the photo at `photo_url`, returning its id.
    ///
    /// Storing is an idempotent overwrite, so identical photos share one record.
    pub async fn enrich(&self, photo_url: &str) -> Result<String, EnrichmentError> {
        let url =
            Url::parse(photo_url).map_err(|_| EnrichmentError::InvalidUrl(photo_url.to_string()))?;
        let fetched = self
            .fetcher
            .get(&url, self.max_bytes)
            .await?
            .ensure_success()?;

        let png = make_thumbnail(&fetched.body, self.size)?;
        let id = thumbnail_id(&png);
        self.store
            .put_as(THUMBNAIL_KIND, &id, &Thumbnail { png })
            .await?;

        info!(photo = %url, id = %id, "stored thumbnail");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_fixture, MockFetcher};
    use docstore::MemoryDocumentStore;

    fn dimensions(png: &[u8]) -> (u32, u32) {
        image::load_from_memory(png).unwrap().dimensions()
    }

    #[test]
    fn test_landscape_anchors_width() {
        let png = make_thumbnail(&png_fixture(64, 48), 32).unwrap();
        assert_eq!(dimensions(&png), (32, 24));
    }

    #[test]
    fn test_portrait_and_square_anchor_height() {
        let png = make_thumbnail(&png_fixture(30, 60), 32).unwrap();
        assert_eq!(dimensions(&png), (16, 32));

        let png = make_thumbnail(&png_fixture(100, 100), 32).unwrap();
        assert_eq!(dimensions(&png), (32, 32));
    }

    #[test]
    fn test_thin_images_keep_one_pixel() {
        let png = make_thumbnail(&png_fixture(500, 2), 32).unwrap();
        assert_eq!(dimensions(&png), (32, 1));
    }

    #[test]
    fn test_zero_size_is_an_error() {
        assert!(matches!(
            make_thumbnail(&png_fixture(40, 20), 0),
            Err(EnrichmentError::InvalidSize)
        ));
    }

    #[test]
    fn test_undecodable_bytes() {
        assert!(matches!(
            make_thumbnail(b"definitely not an image", 32),
            Err(EnrichmentError::Decode(_))
        ));
    }

    #[test]
    fn test_thumbnail_serializes_as_base64() {
        let t = Thumbnail {
            png: vec![1, 2, 3],
        };
        let doc = serde_json::to_value(&t).unwrap();
        assert_eq!(doc, serde_json::json!({"png": "AQID"}));
        assert_eq!(serde_json::from_value::<Thumbnail>(doc).unwrap(), t);
    }

    #[tokio::test]
    async fn test_enrich_stores_content_addressed() {
        let store = Arc::new(MemoryDocumentStore::new("test").unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_response("https://a.example/me.png", 200, png_fixture(40, 40));
        fetcher.add_response("https://b.example/avatar.png", 200, png_fixture(40, 40));

        let enricher = ThumbnailEnricher::new(store.clone(), fetcher.clone());
        let a = enricher.enrich("https://a.example/me.png").await.unwrap();
        let b = enricher.enrich("https://b.example/avatar.png").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.count(THUMBNAIL_KIND).await, 1);

        let stored: Thumbnail = store.get_as(THUMBNAIL_KIND, &a).await.unwrap();
        assert_eq!(thumbnail_id(&stored.png), a);
    }

    #[tokio::test]
    async fn test_enrich_failures_are_typed() {
        let store = Arc::new(MemoryDocumentStore::new("test").unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.add_response("https://a.example/broken.jpg", 200, b"<html>".to_vec());
        let enricher = ThumbnailEnricher::new(store.clone(), fetcher);

        assert!(matches!(
            enricher.enrich("not a url").await,
            Err(EnrichmentError::InvalidUrl(_))
        ));
        assert!(matches!(
            enricher.enrich("https://a.example/missing.png").await,
            Err(EnrichmentError::Fetch(_))
        ));
        assert!(matches!(
            enricher.enrich("https://a.example/broken.jpg").await,
            Err(EnrichmentError::Decode(_))
        ));
        assert_eq!(store.count(THUMBNAIL_KIND).await, 0);
    }
}
