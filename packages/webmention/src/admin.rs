//! Administrator gate for triage.
//!
//! The HTTP layer extracts the caller's identity token (usually an
//! `id_token` cookie) into [`Credentials`]. An
//! [`IdentityVerifier`] decides whether those belong to an administrator,
//! and [`Triage`] refuses privileged operations otherwise.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, MentionError, Result};
use crate::mention::{Mention, MentionState};
use crate::mentions::{MentionWithKey, Mentions};

/// Google's token introspection endpoint.
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Caller identity as presented to the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub id_token: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_id_token(token: impl Into<String>) -> Self {
        Self {
            id_token: Some(token.into()),
        }
    }
}

/// Decides whether a caller is an administrator.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn is_admin(&self, credentials: &Credentials) -> bool;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    aud: Option<String>,
}

/// Verifies identity tokens against a token-info endpoint.
///
/// A caller is an admin when the token's audience is our client id and its
/// email is on the admin list. Any failure answers "not an admin".
pub struct TokenInfoVerifier {
    client: reqwest::Client,
    endpoint: Url,
    client_id: String,
    admins: Vec<String>,
}

impl TokenInfoVerifier {
    pub fn new(
        client_id: impl Into<String>,
        admins: Vec<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        let endpoint = Url::parse(GOOGLE_TOKENINFO_URL)
            .map_err(|_| FetchError::UnsupportedUrl(GOOGLE_TOKENINFO_URL.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            client_id: client_id.into(),
            admins,
        })
    }

    /// Use another token-info endpoint.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn accepts(&self, info: &TokenInfo) -> bool {
        let audience_ok = info.aud.as_deref() == Some(self.client_id.as_str());
        let email_ok = info
            .email
            .as_deref()
            .is_some_and(|email| self.admins.iter().any(|a| a == email));
        audience_ok && email_ok
    }
}

#[async_trait]
impl IdentityVerifier for TokenInfoVerifier {
    async fn is_admin(&self, credentials: &Credentials) -> bool {
        let Some(token) = credentials.id_token.as_deref().filter(|t| !t.is_empty()) else {
            return false;
        };

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id_token", token);

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "token verification request failed");
                return false;
            }
        };
        if !response.status().is_success() {
            debug!(status = %response.status(), "token rejected");
            return false;
        }

        match response.json::<TokenInfo>().await {
            Ok(info) => {
                let ok = self.accepts(&info);
                if !ok {
                    warn!(email = ?info.email, "non-admin attempted triage");
                }
                ok
            }
            Err(e) => {
                warn!(error = %e, "unreadable token info");
                false
            }
        }
    }
}

/// Admin-gated view of the triage store.
pub struct Triage {
    mentions: Arc<Mentions>,
    identity: Arc<dyn IdentityVerifier>,
}

impl Triage {
    pub fn new(mentions: Arc<Mentions>, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self { mentions, identity }
    }

    async fn require_admin(&self, credentials: &Credentials) -> Result<()> {
        if self.identity.is_admin(credentials).await {
            Ok(())
        } else {
            Err(MentionError::Unauthorized)
        }
    }

    /// Newest-first page of mentions with their opaque update keys.
    pub async fn list(
        &self,
        credentials: &Credentials,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MentionWithKey>> {
        self.require_admin(credentials).await?;
        self.mentions.list_for_triage(limit, offset).await
    }

    /// Set the state of the mention behind `key`. `state` is the wire form
    /// (`untriaged`, `good` or `spam`).
    pub async fn update(&self, credentials: &Credentials, key: &str, state: &str) -> Result<Mention> {
        self.require_admin(credentials).await?;
        let state: MentionState = state.parse()?;
        self.mentions.set_state(key, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenInfoVerifier {
        TokenInfoVerifier::new(
            "client-123",
            vec!["admin@example.org".to_string()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_accepts_requires_audience_and_admin_email() {
        let v = verifier();
        let info = |aud: &str, email: &str| TokenInfo {
            aud: Some(aud.to_string()),
            email: Some(email.to_string()),
        };

        assert!(v.accepts(&info("client-123", "admin@example.org")));
        assert!(!v.accepts(&info("someone-else", "admin@example.org")));
        assert!(!v.accepts(&info("client-123", "mallory@example.org")));
        assert!(!v.accepts(&TokenInfo {
            aud: None,
            email: None
        }));
    }

    #[test]
    fn test_token_info_parses_extra_fields() {
        let info: TokenInfo = serde_json::from_str(
            r#"{"aud":"client-123","email":"admin@example.org","email_verified":"true","exp":"1"}"#,
        )
        .unwrap();
        assert!(verifier().accepts(&info));
    }

    #[tokio::test]
    async fn test_missing_token_is_not_admin() {
        let v = verifier();
        assert!(!v.is_admin(&Credentials::anonymous()).await);
        assert!(!v.is_admin(&Credentials::from_id_token("")).await);
    }
}
