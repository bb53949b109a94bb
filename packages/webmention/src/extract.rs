//! Mention metadata from parsed microformats.
//!
//! Extraction is pure: it reads a [`Document`] and returns an [`Extracted`]
//! patch that the verifier merges into the mention once.

use chrono::{DateTime, FixedOffset};

use crate::mention::Mention;
use crate::microformats::{Document, Item, PropertyValue};

/// Tag-URI prefixes used by syndication bridges, and the title shown instead.
pub const BRIDGES: &[(&str, &str)] = &[
    ("tag:twitter", "Twitter"),
    ("tag:facebook", "Facebook"),
    ("tag:instagram", "Instagram"),
    ("tag:github", "GitHub"),
    ("tag:flickr", "Flickr"),
    ("tag:mastodon", "Mastodon"),
];

/// Metadata found on a source page. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub permalink: Option<String>,
    /// Author photo to hand to the thumbnail enricher.
    pub photo_url: Option<String>,
}

impl Extracted {
    /// Merge found fields into `mention`, leaving the rest untouched.
    pub fn apply(self, mention: &mut Mention) {
        if self.title.is_some() {
            mention.title = self.title;
        }
        if self.author.is_some() {
            mention.author = self.author;
        }
        if self.author_url.is_some() {
            mention.author_url = self.author_url;
        }
        if self.published_at.is_some() {
            mention.published_at = self.published_at;
        }
        if self.permalink.is_some() {
            mention.permalink = self.permalink;
        }
    }
}

/// Display name for a bridged tag URI.
pub fn bridge_name(id: &str) -> Option<&'static str> {
    BRIDGES
        .iter()
        .find(|(prefix, _)| id.starts_with(prefix))
        .map(|(_, name)| *name)
}

/// Extract metadata from the first `h-entry` in document order.
pub fn extract(doc: &Document, source: &str) -> Extracted {
    let Some(entry) = doc.walk().into_iter().find(|item| item.has_type("h-entry")) else {
        return Extracted::default();
    };

    let mut out = Extracted {
        title: entry_title(entry),
        published_at: entry
            .property("published")
            .iter()
            .filter_map(PropertyValue::as_text)
            .find_map(|s| DateTime::parse_from_rfc3339(s.trim()).ok()),
        permalink: entry
            .first_text("url")
            .filter(|url| *url != source)
            .map(str::to_string),
        ..Default::default()
    };

    match entry.property("author").first() {
        Some(PropertyValue::Item(author)) => {
            out.author = author
                .value
                .as_deref()
                .or_else(|| author.first_text("name"))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            out.author_url = doc
                .rel("author")
                .or_else(|| author.first_text("url"))
                .map(str::to_string);
            out.photo_url = author.first_text("photo").map(str::to_string);
        }
        Some(text) => {
            out.author = text.as_text().filter(|s| !s.is_empty()).map(str::to_string);
            out.author_url = doc.rel("author").map(str::to_string);
        }
        None => {}
    }

    out
}

fn entry_title(entry: &Item) -> Option<String> {
    let uid = entry.first_text("uid");
    let mut title = match uid.and_then(bridge_name) {
        Some(service) => service.to_string(),
        None => {
            let named = entry.first_text("name").or(uid).unwrap_or_default().trim();
            bridge_name(named).map(str::to_string).unwrap_or_else(|| named.to_string())
        }
    };

    if entry.has_property("like-of") {
        title.push_str(" Like");
    }
    if entry.has_property("repost-of") {
        title.push_str(" Repost");
    }

    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microformats::parse;
    use url::Url;

    const SOURCE: &str = "https://example.org/news/x";

    fn extract_html(html: &str) -> Extracted {
        let doc = parse(html, &Url::parse(SOURCE).unwrap());
        extract(&doc, SOURCE)
    }

    #[test]
    fn test_full_entry() {
        let got = extract_html(
            r#"
            <article class="post h-entry">
              <h1 class="post-title p-name">WebMention Only</h1>
              <a class="u-url" href="/news/x">
                <time datetime="2018-01-13T00:00:00-05:00" class="dt-published"> Jan 13, 2018 </time>
              </a>
              <a rel="author" class="p-author h-card" href="/about">
                <span><img class="u-photo" src="/images/joe2016.jpg" alt=""><span>Joe Gregorio</span></span>
              </a>
              <div class="e-content"><p>Hello.</p></div>
            </article>
            "#,
        );

        assert_eq!(got.title.as_deref(), Some("WebMention Only"));
        assert_eq!(
            got.published_at,
            Some(DateTime::parse_from_rfc3339("2018-01-13T00:00:00-05:00").unwrap())
        );
        assert_eq!(got.author.as_deref(), Some("Joe Gregorio"));
        assert_eq!(got.author_url.as_deref(), Some("https://example.org/about"));
        assert_eq!(
            got.photo_url.as_deref(),
            Some("https://example.org/images/joe2016.jpg")
        );
        // The entry url is the source itself.
        assert_eq!(got.permalink, None);
    }

    #[test]
    fn test_bridged_like_ignores_name() {
        let got = extract_html(
            r#"
            <div class="h-entry">
              <span class="p-name">Some long tweet text</span>
              <data class="u-uid" value="tag:twitter.com,2013:949811203540668416"></data>
              <a class="u-like-of" href="https://bitworking.org/news/1"></a>
              <a class="u-url" href="https://twitter.com/someone/status/949811203540668416"></a>
            </div>
            "#,
        );
        assert_eq!(got.title.as_deref(), Some("Twitter Like"));
        assert_eq!(
            got.permalink.as_deref(),
            Some("https://twitter.com/someone/status/949811203540668416")
        );
    }

    #[test]
    fn test_uid_used_when_no_name() {
        let got = extract_html(
            r#"
            <div class="h-entry">
              <p class="p-summary">no name here</p>
              <a class="u-uid" href="https://example.org/posts/7"></a>
              <div class="u-repost-of h-cite"><a class="u-url" href="https://bitworking.org/a">a</a></div>
            </div>
            "#,
        );
        assert_eq!(got.title.as_deref(), Some("https://example.org/posts/7 Repost"));
    }

    #[test]
    fn test_author_url_falls_back_to_card_url() {
        let got = extract_html(
            r#"
            <div class="h-entry">
              <span class="p-name">Hi</span>
              <span class="p-author h-card"><a class="p-name u-url" href="https://alice.example/">Alice</a></span>
              <time class="dt-published">not a date</time>
              <time class="dt-published" datetime="2019-05-01T12:30:00Z"></time>
            </div>
            "#,
        );
        assert_eq!(got.author.as_deref(), Some("Alice"));
        assert_eq!(got.author_url.as_deref(), Some("https://alice.example/"));
        assert_eq!(got.photo_url, None);
        assert_eq!(
            got.published_at,
            Some(DateTime::parse_from_rfc3339("2019-05-01T12:30:00Z").unwrap())
        );
    }

    #[test]
    fn test_first_entry_wins_and_nested_entries_found() {
        let got = extract_html(
            r#"
            <div class="h-feed">
              <div class="h-entry"><span class="p-name">First</span></div>
              <div class="h-entry"><span class="p-name">Second</span></div>
            </div>
            "#,
        );
        assert_eq!(got.title.as_deref(), Some("First"));
    }

    #[test]
    fn test_child_entry_before_property_entry_wins() {
        let got = extract_html(
            r#"<div class="h-feed"><div class="h-entry">First in document</div><div class="p-featured h-entry">Second in document</div></div>"#,
        );
        assert_eq!(got.title.as_deref(), Some("First in document"));
    }

    #[test]
    fn test_property_entries_follow_document_not_name_order() {
        let got = extract_html(
            r#"<div class="h-feed"><div class="p-zeta h-entry">Zeta first</div><div class="p-alpha h-entry">Alpha second</div></div>"#,
        );
        assert_eq!(got.title.as_deref(), Some("Zeta first"));
    }

    #[test]
    fn test_no_entry_yields_nothing() {
        let got = extract_html(r#"<div class="h-card"><span class="p-name">Bob</span></div>"#);
        assert_eq!(got, Extracted::default());
    }

    #[test]
    fn test_entry_without_name_or_uid_has_no_title() {
        let got = extract_html(r#"<div class="h-entry"><p class="p-summary">x</p></div>"#);
        assert_eq!(got.title, None);

        let mut m = Mention::new(SOURCE, "https://bitworking.org/");
        got.apply(&mut m);
        assert_eq!(m.display_title(), SOURCE);
    }

    #[test]
    fn test_apply_keeps_existing_fields() {
        let mut m = Mention::new(SOURCE, "https://bitworking.org/");
        m.author = Some("Earlier".into());

        Extracted {
            title: Some("T".into()),
            ..Default::default()
        }
        .apply(&mut m);

        assert_eq!(m.title.as_deref(), Some("T"));
        assert_eq!(m.author.as_deref(), Some("Earlier"));
    }

    #[test]
    fn test_bridge_table() {
        assert_eq!(bridge_name("tag:twitter.com,2013:1"), Some("Twitter"));
        assert_eq!(bridge_name("tag:github.com,2013:x"), Some("GitHub"));
        assert_eq!(bridge_name("https://twitter.com/x"), None);
    }
}
