//! Typed errors for the document store.

use thiserror::Error;

/// Errors surfaced by every [`DocumentStore`](crate::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store handle was built without a tenant namespace.
    #[error("namespace must not be empty")]
    InvalidNamespace,

    /// No document exists under the key.
    #[error("document not found: {kind}/{key}")]
    NotFound { kind: String, key: String },

    /// The backend refused to commit a read-modify-write.
    #[error("transaction conflict on {kind}/{key}")]
    TransactionConflict { kind: String, key: String },

    /// Transport or backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A document could not be converted to or from its typed form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &str, key: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    pub fn conflict(kind: &str, key: &str) -> Self {
        Self::TransactionConflict {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
