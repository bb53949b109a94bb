//! Slow verification: fetch the source and confirm it links to the target.

use std::sync::Arc;

use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::VerificationError;
use crate::extract::{extract, Extracted};
use crate::fetch::HttpFetcher;
use crate::links::{discover_in, links_to};
use crate::mention::{Mention, MentionState};
use crate::microformats::parse_html;
use crate::thumbnail::ThumbnailEnricher;

/// Largest source page accepted.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 5 * 1024 * 1024;

/// Fetches a mention's source once and enriches it from the page markup.
///
/// Single-shot: retries are left to the next batch run.
pub struct Verifier {
    fetcher: Arc<dyn HttpFetcher>,
    thumbnails: ThumbnailEnricher,
    max_source_bytes: usize,
}

impl Verifier {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, thumbnails: ThumbnailEnricher) -> Self {
        Self {
            fetcher,
            thumbnails,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
        }
    }

    pub fn with_max_source_bytes(mut self, max_bytes: usize) -> Self {
        self.max_source_bytes = max_bytes;
        self
    }

    /// Verify `mention` and merge any metadata found on its source page.
    ///
    /// Leaves `state` alone; see [`classify`](Self::classify).
    pub async fn verify(&self, mention: &mut Mention) -> Result<(), VerificationError> {
        let source = Url::parse(&mention.source)
            .map_err(|e| VerificationError::ParseFailure(format!("source: {}", e)))?;
        let target = Url::parse(&mention.target)
            .map_err(|e| VerificationError::ParseFailure(format!("target: {}", e)))?;

        let fetched = self
            .fetcher
            .get(&source, self.max_source_bytes)
            .await?
            .ensure_success()?;
        debug!(
            source = %source,
            final_url = %fetched.final_url,
            bytes = fetched.body.len(),
            "fetched source"
        );

        // Links resolve against the declared source even after redirects;
        // the source is what claimed the mention.
        let extracted = analyze(&fetched.text(), &source, &target, &mention.source)?;
        let photo = extracted.photo_url.clone();
        extracted.apply(mention);

        if let Some(photo) = photo {
            match self.thumbnails.enrich(&photo).await {
                Ok(id) => mention.thumbnail_id = Some(id),
                Err(e) => {
                    warn!(source = %mention.source, photo = %photo, error = %e, "thumbnail enrichment failed")
                }
            }
        }

        Ok(())
    }

    /// Verify and set `state` to `good` or `spam`, returning the new state.
    pub async fn classify(&self, mention: &mut Mention) -> MentionState {
        mention.state = match self.verify(mention).await {
            Ok(()) => MentionState::Good,
            Err(e) => {
                info!(source = %mention.source, target = %mention.target, error = %e, "mention failed verification");
                MentionState::Spam
            }
        };
        mention.state
    }
}

/// Check for the target link and extract metadata. Synchronous so the parsed
/// document never lives across an await.
fn analyze(
    html: &str,
    source: &Url,
    target: &Url,
    source_str: &str,
) -> Result<Extracted, VerificationError> {
    let document = Html::parse_document(html);
    let links = discover_in(&document, source);
    if !links_to(&links, target) {
        return Err(VerificationError::TargetNotLinked);
    }
    let mf2 = parse_html(&document, source);
    Ok(extract(&mf2, source_str))
}
