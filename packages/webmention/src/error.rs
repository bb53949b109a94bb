//! Typed errors for the webmention pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only configuration
//! loading and the binaries reach for `anyhow`.

use docstore::StoreError;
use thiserror::Error;

/// Why a freshly submitted mention was rejected.
///
/// The specific reason is for logs only. Callers answering the submitter
/// should use [`MentionError::public_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("source is empty")]
    EmptySource,

    #[error("target is empty")]
    EmptyTarget,

    #[error("source and target are the same")]
    SameSourceAndTarget,

    #[error("target is not an absolute URL: {0}")]
    InvalidTarget(String),

    #[error("target host is not allowed: {host}")]
    TargetNotAllowed { host: String },

    #[error("target must use https: {scheme}")]
    InsecureTarget { scheme: String },

    #[error("source is not an absolute http(s) URL: {0}")]
    InvalidSource(String),
}

/// Errors from a single HTTP retrieval.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Why the slow verifier classified a mention as spam.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Transport failure, timeout or non-2xx response.
    #[error("source unreachable: {0}")]
    Unreachable(#[source] FetchError),

    /// The source body exceeded the configured cap.
    #[error("source exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("source does not link to target")]
    TargetNotLinked,

    #[error("cannot parse mention: {0}")]
    ParseFailure(String),
}

impl From<FetchError> for VerificationError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::TooLarge { limit, .. } => Self::TooLarge { limit },
            other => Self::Unreachable(other),
        }
    }
}

/// Soft failures while building an author thumbnail. Logged, never fatal.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("invalid photo URL: {0}")]
    InvalidUrl(String),

    #[error("photo fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("thumbnail size must be at least one pixel")]
    InvalidSize,

    #[error("photo decode failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("thumbnail encode failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("thumbnail store failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the triage store and its admin façade.
#[derive(Debug, Error)]
pub enum MentionError {
    #[error("invalid mention: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid triage key")]
    InvalidKey,

    #[error("unknown mention state: {0}")]
    InvalidState(String),

    #[error("not authorized")]
    Unauthorized,
}

impl MentionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::TransactionConflict { .. }))
    }

    /// Message safe to show the caller.
    ///
    /// Rejected submissions all read the same so the allow-list can't be
    /// probed. Triage failures stay specific for the admin UI.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidKey | Self::InvalidState(_) => "Invalid request.",
            Self::Unauthorized => "Not authorized.",
            Self::Store(StoreError::NotFound { .. }) => "Mention not found.",
            Self::Store(StoreError::TransactionConflict { .. }) => {
                "Mention was changed by someone else, try again."
            }
            Self::Store(_) => "Service unavailable.",
        }
    }
}

pub type Result<T> = std::result::Result<T, MentionError>;
