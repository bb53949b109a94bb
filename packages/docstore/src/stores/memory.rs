//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{compare_values, Direction, Document, DocumentStore, Query, UpdateFn};

type Records = HashMap<(String, String, String), Document>;

/// In-memory document store.
///
/// Handles created with [`with_namespace`](Self::with_namespace) share the
/// same backing map, so namespace isolation can be exercised in tests. Data
/// is lost when the last handle is dropped.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    namespace: String,
    records: Arc<RwLock<Records>>,
}

impl MemoryDocumentStore {
    /// Create an empty store scoped to `namespace`.
    pub fn new(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(StoreError::InvalidNamespace);
        }
        Ok(Self {
            namespace,
            records: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// A handle on the same backing data scoped to another namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(StoreError::InvalidNamespace);
        }
        Ok(Self {
            namespace,
            records: Arc::clone(&self.records),
        })
    }

    /// Number of documents of `kind` in this namespace.
    pub async fn count(&self, kind: &str) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(ns, k, _)| ns == &self.namespace && k == kind)
            .count()
    }

    fn address(&self, kind: &str, key: &str) -> (String, String, String) {
        (self.namespace.clone(), kind.to_string(), key.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, kind: &str, key: &str) -> Result<Document> {
        self.records
            .read()
            .await
            .get(&self.address(kind, key))
            .cloned()
            .ok_or_else(|| StoreError::not_found(kind, key))
    }

    async fn put(&self, kind: &str, key: &str, doc: Document) -> Result<()> {
        self.records.write().await.insert(self.address(kind, key), doc);
        Ok(())
    }

    async fn query(&self, kind: &str, query: &Query) -> Result<Vec<(String, Document)>> {
        let records = self.records.read().await;
        let mut rows: Vec<(String, Document)> = records
            .iter()
            .filter(|((ns, k, _), doc)| ns == &self.namespace && k == kind && query.matches(doc))
            .map(|((_, _, key), doc)| (key.clone(), doc.clone()))
            .collect();
        drop(records);

        match &query.order {
            Some(order) => rows.sort_by(|(ka, a), (kb, b)| {
                let ord = compare_values(a.get(&order.field), b.get(&order.field));
                let ord = match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| ka.cmp(kb))
            }),
            None => rows.sort_by(|(ka, _), (kb, _)| ka.cmp(kb)),
        }

        let rows: Vec<_> = rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        debug!(kind, count = rows.len(), "memory query");
        Ok(rows)
    }

    async fn update(&self, kind: &str, key: &str, f: UpdateFn) -> Result<Document> {
        // The write guard is held across read, modify and write.
        let mut records = self.records.write().await;
        let address = self.address(kind, key);
        let current = records
            .get(&address)
            .cloned()
            .ok_or_else(|| StoreError::not_found(kind, key))?;
        let next = f(current)?;
        records.insert(address, next.clone());
        Ok(next)
    }
}
