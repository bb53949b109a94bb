//! Bookkeeping for outbound notifications.
//!
//! Records when a webmention was last sent for a source page so the same
//! remote endpoints are not notified again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docstore::{DocumentStore, DocumentStoreExt, StoreError};
use serde::{Deserialize, Serialize};

/// Document kind sent records are stored under.
pub const SENT_KIND: &str = "WebMentionSent";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SentRecord {
    #[serde(with = "chrono::serde::ts_microseconds")]
    ts: DateTime<Utc>,
}

pub struct SentLog {
    store: Arc<dyn DocumentStore>,
}

impl SentLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// When notifications for `source` were last sent, if ever.
    pub async fn sent(&self, source: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let found: Result<SentRecord, StoreError> = self.store.get_as(SENT_KIND, source).await;
        match found {
            Ok(record) => Ok(Some(record.ts)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn record_sent(&self, source: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .put_as(SENT_KIND, source, &SentRecord { ts: at })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docstore::MemoryDocumentStore;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let log = SentLog::new(Arc::new(MemoryDocumentStore::new("test").unwrap()));
        let source = "https://bitworking.org/news/2018/01/webmention";

        assert_eq!(log.sent(source).await.unwrap(), None);

        let first = Utc.with_ymd_and_hms(2018, 1, 13, 5, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2018, 1, 14, 5, 0, 0).unwrap();
        log.record_sent(source, first).await.unwrap();
        log.record_sent(source, second).await.unwrap();

        assert_eq!(log.sent(source).await.unwrap(), Some(second));
        assert_eq!(log.sent("https://bitworking.org/other").await.unwrap(), None);
    }
}
