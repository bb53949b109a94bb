//! The triage store: ingest, batch verification, listings and state changes.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use docstore::{Document, DocumentStore, DocumentStoreExt, Query, StoreError};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{MentionError, Result};
use crate::mention::{Mention, MentionState, MENTIONS_KIND};
use crate::thumbnail::{Thumbnail, THUMBNAIL_KIND};
use crate::validate::AllowList;
use crate::verify::Verifier;

/// A mention plus the opaque key used to update it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentionWithKey {
    #[serde(flatten)]
    pub mention: Mention,
    pub key: String,
}

/// Outcome of one [`Mentions::verify_batch`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub queued: usize,
    pub good: usize,
    pub spam: usize,
    /// Results that could not be written. They stay queued for the next run.
    pub write_failures: usize,
}

/// Encode a dedup key as an opaque triage key.
pub fn encode_key(dedup_key: &str) -> String {
    URL_SAFE_NO_PAD.encode(dedup_key.as_bytes())
}

/// Decode an opaque triage key back to a dedup key.
pub fn decode_key(key: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key.trim())
        .map_err(|_| MentionError::InvalidKey)?;
    let raw = String::from_utf8(bytes).map_err(|_| MentionError::InvalidKey)?;
    if raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(raw)
    } else {
        Err(MentionError::InvalidKey)
    }
}

/// Query and mutation surface over stored mentions.
pub struct Mentions {
    store: Arc<dyn DocumentStore>,
    allow: AllowList,
    verifier: Verifier,
}

impl Mentions {
    pub fn new(store: Arc<dyn DocumentStore>, allow: AllowList, verifier: Verifier) -> Self {
        Self {
            store,
            allow,
            verifier,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    /// Validate and upsert a new submission, returning its dedup key.
    ///
    /// Resubmitting a pair overwrites the stored record, state included.
    pub async fn enqueue(&self, mention: Mention) -> Result<String> {
        if let Err(e) = mention.validate(&self.allow) {
            info!(source = %mention.source, target = %mention.target, reason = %e, "rejected mention");
            return Err(e.into());
        }
        let key = mention.key();
        self.store.put_as(MENTIONS_KIND, &key, &mention).await?;
        info!(source = %mention.source, target = %mention.target, key = %key, "queued mention");
        Ok(key)
    }

    /// Upsert without validation.
    pub async fn put(&self, mention: &Mention) -> Result<()> {
        self.store
            .put_as(MENTIONS_KIND, &mention.key(), mention)
            .await?;
        Ok(())
    }

    /// Fetch by dedup key.
    pub async fn get(&self, key: &str) -> Result<Mention> {
        Ok(self.store.get_as(MENTIONS_KIND, key).await?)
    }

    /// Every `untriaged` mention, in no particular order.
    pub async fn list_queued(&self) -> Result<Vec<Mention>> {
        let query = Query::new().filter("state", MentionState::Untriaged.as_str());
        Ok(self.query(&query).await?)
    }

    /// Verify every queued mention and persist the result.
    ///
    /// Per-item failures never abort the batch. Only failing to read the
    /// queue is an error.
    pub async fn verify_batch(&self) -> Result<BatchReport> {
        let queued = self.list_queued().await?;
        let mut report = BatchReport {
            queued: queued.len(),
            ..Default::default()
        };

        for mut mention in queued {
            // Fallback timestamp when the source carries none.
            mention.published_at = Some(Utc::now().into());
            match self.verifier.classify(&mut mention).await {
                MentionState::Good => report.good += 1,
                _ => report.spam += 1,
            }

            if let Err(e) = self.store_verified(mention.clone()).await {
                warn!(source = %mention.source, error = %e, "failed to store verification result");
                report.write_failures += 1;
            }
        }

        info!(
            queued = report.queued,
            good = report.good,
            spam = report.spam,
            write_failures = report.write_failures,
            "verification batch finished"
        );
        Ok(report)
    }

    /// Write a verified mention transactionally. A state set by an
    /// administrator while verification ran is kept.
    async fn store_verified(&self, verified: Mention) -> std::result::Result<(), StoreError> {
        let key = verified.key();
        self.store
            .update(
                MENTIONS_KIND,
                &key,
                Box::new(move |current: Document| -> docstore::Result<Document> {
                    let current: Mention = serde_json::from_value(current)?;
                    let mut next = verified;
                    if current.state != MentionState::Untriaged {
                        next.state = current.state;
                    }
                    Ok(serde_json::to_value(next)?)
                }),
            )
            .await?;
        Ok(())
    }

    /// `good` mentions of `target`, oldest first.
    pub async fn list_good(&self, target: &str) -> Result<Vec<Mention>> {
        let query = Query::new()
            .filter("target", target)
            .filter("state", MentionState::Good.as_str())
            .order_by("received_at");
        Ok(self.query(&query).await?)
    }

    /// All mentions of `target`, oldest first.
    pub async fn list_all(&self, target: &str) -> Result<Vec<Mention>> {
        let query = Query::new().filter("target", target).order_by("received_at");
        Ok(self.query(&query).await?)
    }

    /// Newest-first page of mentions with opaque update keys.
    pub async fn list_for_triage(&self, limit: usize, offset: usize) -> Result<Vec<MentionWithKey>> {
        let query = Query::new()
            .order_by_desc("received_at")
            .limit(limit)
            .offset(offset);
        let rows: Vec<(String, Mention)> = self.store.query_as(MENTIONS_KIND, &query).await?;
        Ok(rows
            .into_iter()
            .map(|(key, mention)| MentionWithKey {
                mention,
                key: encode_key(&key),
            })
            .collect())
    }

    /// Transactionally set the state of the mention behind an opaque key.
    ///
    /// Fails with `NotFound` if the key no longer resolves and with
    /// `TransactionConflict` if the store refuses the commit.
    pub async fn set_state(&self, key: &str, state: MentionState) -> Result<Mention> {
        let raw = decode_key(key)?;
        let doc = self
            .store
            .update(
                MENTIONS_KIND,
                &raw,
                Box::new(move |current: Document| -> docstore::Result<Document> {
                    let mut mention: Mention = serde_json::from_value(current)?;
                    mention.state = state;
                    Ok(serde_json::to_value(mention)?)
                }),
            )
            .await?;
        let mention: Mention = serde_json::from_value(doc).map_err(StoreError::from)?;
        info!(source = %mention.source, state = %state, "triaged mention");
        Ok(mention)
    }

    /// PNG bytes of a stored thumbnail.
    pub async fn get_thumbnail(&self, id: &str) -> Result<Vec<u8>> {
        let thumbnail: Thumbnail = self.store.get_as(THUMBNAIL_KIND, id).await?;
        Ok(thumbnail.png)
    }

    async fn query(&self, query: &Query) -> std::result::Result<Vec<Mention>, StoreError> {
        let rows: Vec<(String, Mention)> = self.store.query_as(MENTIONS_KIND, query).await?;
        Ok(rows.into_iter().map(|(_, m)| m).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let raw = crate::mention::dedup_key("https://a.example/", "https://bitworking.org/");
        let opaque = encode_key(&raw);
        assert_ne!(opaque, raw);
        assert_eq!(decode_key(&opaque).unwrap(), raw);
    }

    #[test]
    fn test_rejects_garbage_keys() {
        let short = encode_key("short");
        for bad in ["", "!!!", "bm90IGEga2V5", short.as_str()] {
            assert!(matches!(decode_key(bad), Err(MentionError::InvalidKey)));
        }
    }
}
