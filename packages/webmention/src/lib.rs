//! Webmention ingest, verification, enrichment and triage.
//!
//! A source page claims to link to one of the operator's pages (the target).
//! Submissions are validated cheaply and queued as `untriaged`. A batch run
//! later fetches each source, confirms the link, pulls title, author and
//! publish time from microformats2 markup, caches the author's photo as a
//! small content-addressed PNG, and marks the mention `good` or `spam`.
//! Administrators can override any state afterwards.
//!
//! # Usage
//!
//! ```rust,ignore
//! use webmention::{AppContext, Config, Mention};
//!
//! let ctx = AppContext::from_config(config, store)?;
//! ctx.mentions.enqueue(Mention::new(source, target)).await?;
//! let report = ctx.mentions.verify_batch().await?;
//! let feed = ctx.mentions.list_good(target).await?;
//! ```
//!
//! # Modules
//!
//! - [`mention`] - The mention record, state and dedup key
//! - [`validate`] - Fast structural validation and the target allow-list
//! - [`fetch`] - HTTP retrieval with size caps
//! - [`links`] - Outbound link discovery
//! - [`microformats`] - Typed microformats2 parsing
//! - [`extract`] - Title/author/published extraction
//! - [`thumbnail`] - Author photo thumbnails
//! - [`verify`] - Slow verification of a single mention
//! - [`mentions`] - The triage store
//! - [`admin`] - Administrator gate
//! - [`sent`] - Outbound notification bookkeeping
//! - [`testing`] - Mock collaborators

pub mod admin;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod links;
pub mod mention;
pub mod mentions;
pub mod microformats;
pub mod sent;
pub mod testing;
pub mod thumbnail;
pub mod validate;
pub mod verify;

pub use admin::{Credentials, IdentityVerifier, TokenInfoVerifier, Triage};
pub use config::Config;
pub use context::AppContext;
pub use error::{
    EnrichmentError, FetchError, MentionError, Result, ValidationError, VerificationError,
};
pub use extract::{extract, Extracted};
pub use fetch::{Fetched, HttpFetcher, ReqwestFetcher};
pub use mention::{dedup_key, Mention, MentionState};
pub use mentions::{BatchReport, MentionWithKey, Mentions};
pub use sent::SentLog;
pub use thumbnail::{make_thumbnail, Thumbnail, ThumbnailEnricher};
pub use validate::{validate, AllowList};
pub use verify::Verifier;
