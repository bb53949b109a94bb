use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::fetch::DEFAULT_TIMEOUT;
use crate::thumbnail::{DEFAULT_MAX_IMAGE_BYTES, DEFAULT_THUMBNAIL_SIZE};
use crate::validate::AllowList;
use crate::verify::DEFAULT_MAX_SOURCE_BYTES;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Tenant namespace for every stored document.
    pub namespace: String,
    /// Hosts mentions may target.
    pub targets: AllowList,
    /// E-mail addresses allowed to triage.
    pub admins: Vec<String>,
    /// OAuth client id identity tokens must be issued for.
    pub client_id: String,
    /// Public base URL of this service.
    pub host: String,
    pub fetch_timeout: Duration,
    pub max_source_bytes: usize,
    pub max_image_bytes: usize,
    pub thumbnail_size: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{} must be set", key));

        let targets = AllowList::parse(&required("TARGETS")?);
        anyhow::ensure!(!targets.is_empty(), "TARGETS must name at least one host");

        let namespace = required("DATASTORE_NAMESPACE")?;
        anyhow::ensure!(!namespace.is_empty(), "DATASTORE_NAMESPACE must not be empty");

        let thumbnail_size = parse_or(&lookup, "THUMBNAIL_SIZE", DEFAULT_THUMBNAIL_SIZE)?;
        anyhow::ensure!(thumbnail_size > 0, "THUMBNAIL_SIZE must be at least 1");

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            namespace,
            targets,
            admins: lookup("ADMINS")
                .map(|v| {
                    v.split(',')
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            client_id: lookup("CLIENT_ID").unwrap_or_default(),
            host: lookup("HOST").unwrap_or_else(|| "http://localhost:8000".to_string()),
            fetch_timeout: match lookup("FETCH_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(
                    v.parse()
                        .context("FETCH_TIMEOUT_SECS must be a whole number of seconds")?,
                ),
                None => DEFAULT_TIMEOUT,
            },
            max_source_bytes: parse_or(&lookup, "MAX_SOURCE_BYTES", DEFAULT_MAX_SOURCE_BYTES)?,
            max_image_bytes: parse_or(&lookup, "MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            thumbnail_size,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/webmention"),
        ("DATASTORE_NAMESPACE", "blog"),
        ("TARGETS", "bitworking.org"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(MINIMAL).unwrap();
        assert_eq!(config.namespace, "blog");
        assert!(config.targets.allows("bitworking.org"));
        assert!(config.admins.is_empty());
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.thumbnail_size, 32);
        assert_eq!(config.max_source_bytes, DEFAULT_MAX_SOURCE_BYTES);
    }

    #[test]
    fn test_overrides() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("TARGETS", "bitworking.org, www.bitworking.org"),
            ("ADMINS", "joe@example.org, ann@example.org"),
            ("CLIENT_ID", "abc.apps.example"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("THUMBNAIL_SIZE", "48"),
        ]);
        let config = load(&vars).unwrap();

        assert!(config.targets.allows("www.bitworking.org"));
        assert_eq!(config.admins, vec!["joe@example.org", "ann@example.org"]);
        assert_eq!(config.client_id, "abc.apps.example");
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.thumbnail_size, 48);
    }

    #[test]
    fn test_missing_required() {
        let err = load(&MINIMAL[1..]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/webmention"),
            ("DATASTORE_NAMESPACE", ""),
            ("TARGETS", "bitworking.org"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DATASTORE_NAMESPACE"));
    }

    #[test]
    fn test_zero_thumbnail_size_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("THUMBNAIL_SIZE", "0"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("THUMBNAIL_SIZE"));
    }

    #[test]
    fn test_bad_number() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("MAX_IMAGE_BYTES", "lots"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("MAX_IMAGE_BYTES"));
    }
}
