//! Outbound link discovery.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// `(selector, attribute)` pairs that count as a link to the target.
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("video[src]", "src"),
    ("audio[src]", "src"),
    ("source[src]", "src"),
];

/// The base URL references resolve against: the first `<base href>` if it
/// resolves, else `page`.
pub fn document_base(document: &Html, page: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page.clone())
}

/// Every outbound reference in `html`, resolved against `page`, deduplicated
/// in document order.
pub fn discover_links(html: &str, page: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    discover_in(&document, page)
}

pub(crate) fn discover_in(document: &Html, page: &Url) -> Vec<Url> {
    let base = document_base(document, page);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    // One pass per selector keeps each group in document order.
    for (selector, attr) in LINK_SOURCES {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for el in document.select(&sel) {
            let Some(raw) = el.value().attr(attr) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() || is_non_navigable(raw) {
                continue;
            }
            if let Ok(url) = base.join(raw) {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn is_non_navigable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Whether `links` contains `target`, ignoring fragments.
pub fn links_to(links: &[Url], target: &Url) -> bool {
    let mut target = target.clone();
    target.set_fragment(None);
    links.iter().any(|link| {
        let mut link = link.clone();
        link.set_fragment(None);
        link == target
    })
}
