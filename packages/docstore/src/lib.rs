//! Namespaced JSON document store.
//!
//! Records are JSON documents addressed by `(namespace, kind, key)`. The
//! namespace is a tenant string fixed when a store handle is built, so two
//! deployments can share one database without seeing each other's data.
//!
//! # Usage
//!
//! ```rust,ignore
//! use docstore::{DocumentStore, DocumentStoreExt, MemoryDocumentStore, Query};
//!
//! let store = MemoryDocumentStore::new("blog")?;
//! store.put("Mentions", "abc", serde_json::json!({"state": "untriaged"})).await?;
//!
//! let queued = store
//!     .query("Mentions", &Query::new().filter("state", "untriaged"))
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`store`] - The `DocumentStore` trait and query description
//! - [`stores`] - Backends (memory always, PostgreSQL behind `postgres`)
//! - [`error`] - Typed errors

pub mod error;
pub mod store;
pub mod stores;

pub use error::{Result, StoreError};
pub use store::{Direction, Document, DocumentStore, DocumentStoreExt, Order, Query, UpdateFn};
pub use stores::MemoryDocumentStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresDocumentStore;
