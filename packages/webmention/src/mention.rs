//! The mention record and its lifecycle state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MentionError;

/// Document kind mentions are stored under.
pub const MENTIONS_KIND: &str = "Mentions";

/// Triage state.
///
/// Mentions start `Untriaged`, the verifier moves them to `Good` or `Spam`,
/// and an administrator may reassign any state at any time afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionState {
    #[default]
    Untriaged,
    Good,
    Spam,
}

impl MentionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untriaged => "untriaged",
            Self::Good => "good",
            Self::Spam => "spam",
        }
    }
}

impl fmt::Display for MentionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentionState {
    type Err = MentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "untriaged" => Ok(Self::Untriaged),
            "good" => Ok(Self::Good),
            "spam" => Ok(Self::Spam),
            other => Err(MentionError::InvalidState(other.to_string())),
        }
    }
}

/// One inbound mention: `source` claims to link to `target`.
///
/// Enrichment fields are best-effort and stay `None` when the source page
/// carries no usable markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub state: MentionState,
    /// Stored as epoch microseconds so stores order it numerically.
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

impl Mention {
    /// A new untriaged mention received now.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            state: MentionState::Untriaged,
            received_at: Utc::now(),
            title: None,
            author: None,
            author_url: None,
            published_at: None,
            thumbnail_id: None,
            permalink: None,
        }
    }

    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    pub fn with_state(mut self, state: MentionState) -> Self {
        self.state = state;
        self
    }

    /// The dedup key for this mention's `(source, target)` pair.
    pub fn key(&self) -> String {
        dedup_key(&self.source, &self.target)
    }

    /// Where a reader should go to see the mention.
    pub fn display_url(&self) -> &str {
        self.permalink.as_deref().unwrap_or(&self.source)
    }

    /// Title to render, falling back to the source URL.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => &self.source,
        }
    }
}

/// Hex md5 of `source` followed by `target`.
pub fn dedup_key(source: &str, target: &str) -> String {
    let mut input = String::with_capacity(source.len() + target.len());
    input.push_str(source);
    input.push_str(target);
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_key_is_pure_function_of_pair() {
        let a = Mention::new("https://a.example/post", "https://bitworking.org/news/1");
        let b = Mention::new("https://a.example/post", "https://bitworking.org/news/1")
            .with_state(MentionState::Spam);
        let c = Mention::new("https://a.example/other", "https://bitworking.org/news/1");

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(a.key().len(), 32);
    }

    #[test]
    fn test_dedup_key_matches_md5_of_concatenation() {
        // md5("ab")
        assert_eq!(dedup_key("a", "b"), "187ef4436122d1cc2f40dc2b92f0eba0");
    }

    #[test]
    fn test_state_round_trips_through_strings() {
        for state in [MentionState::Untriaged, MentionState::Good, MentionState::Spam] {
            assert_eq!(state.as_str().parse::<MentionState>().unwrap(), state);
        }
        assert!(matches!(
            "deleted".parse::<MentionState>(),
            Err(MentionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let at = Utc.with_ymd_and_hms(2018, 1, 13, 5, 0, 0).unwrap();
        let m = Mention::new("https://a.example/post", "https://bitworking.org/")
            .with_received_at(at)
            .with_state(MentionState::Good);

        let doc = serde_json::to_value(&m).unwrap();
        assert_eq!(doc["state"], json!("good"));
        assert_eq!(doc["received_at"], json!(at.timestamp_micros()));
        assert!(doc.get("title").is_none());

        let back: Mention = serde_json::from_value(doc).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_display_fallbacks() {
        let mut m = Mention::new("https://a.example/post", "https://bitworking.org/");
        assert_eq!(m.display_title(), "https://a.example/post");
        assert_eq!(m.display_url(), "https://a.example/post");

        m.title = Some("Hello".into());
        m.permalink = Some("https://a.example/real".into());
        assert_eq!(m.display_title(), "Hello");
        assert_eq!(m.display_url(), "https://a.example/real");
    }
}
