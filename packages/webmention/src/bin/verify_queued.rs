//! Verify every queued mention once.
//!
//! Meant to be run on a schedule. Items that fail to write stay queued and
//! are retried by the next run.

use std::sync::Arc;

use anyhow::{Context, Result};
use docstore::PostgresDocumentStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webmention::{AppContext, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,webmention=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(namespace = %config.namespace, "Configuration loaded");

    let store = PostgresDocumentStore::new(&config.database_url, config.namespace.clone())
        .await
        .context("Failed to connect to database")?;

    let ctx = AppContext::from_config(config, Arc::new(store))?;
    let report = ctx
        .mentions
        .verify_batch()
        .await
        .context("Failed to read the verification queue")?;

    tracing::info!(
        queued = report.queued,
        good = report.good,
        spam = report.spam,
        write_failures = report.write_failures,
        "Done"
    );
    Ok(())
}
