//! Application context, built once at startup and shared by handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use docstore::DocumentStore;
use tracing::{info, warn};

use crate::admin::{IdentityVerifier, TokenInfoVerifier, Triage};
use crate::config::Config;
use crate::fetch::{HttpFetcher, ReqwestFetcher};
use crate::mentions::Mentions;
use crate::sent::SentLog;
use crate::thumbnail::ThumbnailEnricher;
use crate::verify::Verifier;

/// Everything a request or batch run needs. No process-wide globals.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub mentions: Arc<Mentions>,
    pub triage: Triage,
    pub sent: SentLog,
}

impl AppContext {
    /// Wire the pipeline from explicit collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn HttpFetcher>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let thumbnails = ThumbnailEnricher::new(store.clone(), fetcher.clone())
            .with_size(config.thumbnail_size)
            .with_max_bytes(config.max_image_bytes);
        let verifier =
            Verifier::new(fetcher, thumbnails).with_max_source_bytes(config.max_source_bytes);
        let mentions = Arc::new(Mentions::new(
            store.clone(),
            config.targets.clone(),
            verifier,
        ));

        Self {
            triage: Triage::new(mentions.clone(), identity),
            sent: SentLog::new(store.clone()),
            mentions,
            store,
            config,
        }
    }

    /// Wire the production HTTP fetcher and token verifier around `store`.
    pub fn from_config(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(config.fetch_timeout)
            .context("Failed to create HTTP client")?;
        let identity = TokenInfoVerifier::new(
            config.client_id.clone(),
            config.admins.clone(),
            config.fetch_timeout,
        )
        .context("Failed to create token verifier")?;

        if config.admins.is_empty() || config.client_id.is_empty() {
            warn!("ADMINS or CLIENT_ID unset, triage is disabled");
        }
        info!(
            namespace = %store.namespace(),
            targets = ?config.targets.hosts().collect::<Vec<_>>(),
            "application context ready"
        );

        Ok(Self::new(
            config,
            store,
            Arc::new(fetcher),
            Arc::new(identity),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Credentials;
    use crate::mention::Mention;
    use crate::testing::{MockFetcher, StaticVerifier};
    use crate::validate::AllowList;
    use docstore::MemoryDocumentStore;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            namespace: "test".into(),
            targets: AllowList::parse("bitworking.org"),
            admins: vec![],
            client_id: String::new(),
            host: "http://localhost:8000".into(),
            fetch_timeout: Duration::from_secs(30),
            max_source_bytes: 1024 * 1024,
            max_image_bytes: 1024 * 1024,
            thumbnail_size: 32,
        }
    }

    #[tokio::test]
    async fn test_context_wires_one_store() {
        let store = Arc::new(MemoryDocumentStore::new("test").unwrap());
        let ctx = AppContext::new(
            config(),
            store.clone(),
            Arc::new(MockFetcher::new()),
            Arc::new(StaticVerifier::anyone()),
        );

        ctx.mentions
            .enqueue(Mention::new("https://a.example/", "https://bitworking.org/"))
            .await
            .unwrap();
        assert_eq!(store.count("Mentions").await, 1);

        let denied = ctx.triage.list(&Credentials::anonymous(), 10, 0).await;
        assert!(denied.is_err());
    }
}
