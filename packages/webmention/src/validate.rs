//! Fast, I/O-free validation of submitted mentions.

use std::collections::BTreeSet;

use url::Url;

use crate::error::ValidationError;
use crate::mention::Mention;

/// Hosts the operator accepts mentions for.
///
/// Hosts compare case-insensitively. An empty list accepts nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    hosts: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated host list, e.g. `"bitworking.org,www.bitworking.org"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn allows(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }
}

/// Structural checks on a submission. First failure wins.
///
/// Order: both present, distinct, target absolute, target host allowed,
/// target https, then source an absolute http(s) URL.
pub fn validate(source: &str, target: &str, allow: &AllowList) -> Result<(), ValidationError> {
    if source.is_empty() {
        return Err(ValidationError::EmptySource);
    }
    if target.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    if source == target {
        return Err(ValidationError::SameSourceAndTarget);
    }

    let target_url =
        Url::parse(target).map_err(|e| ValidationError::InvalidTarget(e.to_string()))?;
    let host = target_url
        .host_str()
        .ok_or_else(|| ValidationError::InvalidTarget("missing host".to_string()))?;
    if !allow.allows(host) {
        return Err(ValidationError::TargetNotAllowed {
            host: host.to_string(),
        });
    }
    if target_url.scheme() != "https" {
        return Err(ValidationError::InsecureTarget {
            scheme: target_url.scheme().to_string(),
        });
    }

    let source_url =
        Url::parse(source).map_err(|e| ValidationError::InvalidSource(e.to_string()))?;
    if !matches!(source_url.scheme(), "http" | "https") || source_url.host_str().is_none() {
        return Err(ValidationError::InvalidSource(source.to_string()));
    }

    Ok(())
}

impl Mention {
    pub fn validate(&self, allow: &AllowList) -> Result<(), ValidationError> {
        validate(&self.source, &self.target, allow)
    }
}
