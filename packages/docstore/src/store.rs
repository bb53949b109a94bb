//! The document store contract.
//!
//! Backends implement the raw JSON operations in [`DocumentStore`]; the
//! typed helpers in [`DocumentStoreExt`] come for free on top of them.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// A stored record.
pub type Document = Value;

/// Read-modify-write step run inside [`DocumentStore::update`].
///
/// Receives the current document and returns its replacement. Returning an
/// error aborts the transaction without writing.
pub type UpdateFn = Box<dyn FnOnce(Document) -> Result<Document> + Send>;

/// Sort direction for [`Query`] ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Filter, order and page a query over one kind.
///
/// Filters are equality tests on top-level fields and are ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order = Some(Order {
            field: field.into(),
            direction: Direction::Ascending,
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(Order {
            field: field.into(),
            direction: Direction::Descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether `doc` passes every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Namespaced key/value and query façade over a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The tenant namespace every operation is scoped to.
    fn namespace(&self) -> &str;

    /// Fetch one document. Fails with `NotFound` when absent.
    async fn get(&self, kind: &str, key: &str) -> Result<Document>;

    /// Insert or overwrite one document.
    async fn put(&self, kind: &str, key: &str, doc: Document) -> Result<()>;

    /// Run a filtered, ordered, paged query, returning `(key, document)` pairs.
    async fn query(&self, kind: &str, query: &Query) -> Result<Vec<(String, Document)>>;

    /// Transactional read-modify-write of a single key.
    ///
    /// Concurrent updates of the same key are serialized. Fails with
    /// `NotFound` when the key is absent and `TransactionConflict` when the
    /// backend refuses the commit. Returns the document as written.
    async fn update(&self, kind: &str, key: &str, f: UpdateFn) -> Result<Document>;
}

/// Serde helpers over any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get_as<T: DeserializeOwned + Send>(&self, kind: &str, key: &str) -> Result<T> {
        let doc = self.get(kind, key).await?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn put_as<T: Serialize + Sync>(&self, kind: &str, key: &str, value: &T) -> Result<()> {
        let doc = serde_json::to_value(value)?;
        self.put(kind, key, doc).await
    }

    async fn query_as<T: DeserializeOwned + Send>(
        &self,
        kind: &str,
        query: &Query,
    ) -> Result<Vec<(String, T)>> {
        let rows = self.query(kind, query).await?;
        rows.into_iter()
            .map(|(key, doc)| Ok((key, serde_json::from_value(doc)?)))
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Total order over JSON values used for in-process sorting.
///
/// Missing fields and nulls sort first, numbers compare numerically,
/// strings lexicographically.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let q = Query::new()
            .filter("target", "https://example.com/")
            .filter("state", "good")
            .order_by_desc("received_at")
            .limit(20)
            .offset(40);

        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.limit, Some(20));
        assert_eq!(q.offset, 40);
        assert_eq!(
            q.order,
            Some(Order {
                field: "received_at".into(),
                direction: Direction::Descending
            })
        );
    }

    #[test]
    fn test_matches_requires_every_filter() {
        let doc = json!({"target": "https://example.com/", "state": "spam"});

        assert!(Query::new().matches(&doc));
        assert!(Query::new().filter("state", "spam").matches(&doc));
        assert!(!Query::new()
            .filter("state", "spam")
            .filter("target", "https://other.example/")
            .matches(&doc));
        assert!(!Query::new().filter("missing", "x").matches(&doc));
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let small = json!(9);
        let big = json!(10);
        assert_eq!(compare_values(Some(&small), Some(&big)), Ordering::Less);

        let a = json!(1.5);
        let b = json!(1.25);
        assert_eq!(compare_values(Some(&a), Some(&b)), Ordering::Greater);
    }

    #[test]
    fn test_missing_sorts_first() {
        let s = json!("a");
        assert_eq!(compare_values(None, Some(&s)), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None), Ordering::Equal);
    }
}
