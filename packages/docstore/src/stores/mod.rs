//! Storage backends.
//!
//! Available backends:
//! - `MemoryDocumentStore` - In-process storage (always available)
//! - `PostgresDocumentStore` - PostgreSQL JSONB storage (requires `postgres` feature)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryDocumentStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
