//! Microformats2 parsing.
//!
//! Produces a typed tree instead of a dynamic property bag. The parser covers
//! the parts of the mf2 parsing algorithm that mention extraction relies on:
//! root and nested `h-*` items, `p-`/`u-`/`dt-`/`e-` properties, implied
//! `name`/`photo`/`url`, and document-level `rel` links. The value-class
//! pattern and backcompat (mf1) classes are not supported.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::links::document_base;

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Top-level items in document order.
    pub items: Vec<Item>,
    /// `rel` token to resolved hrefs, in document order.
    pub rels: BTreeMap<String, Vec<String>>,
}

/// One microformat item, e.g. an `h-entry` or `h-card`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub types: Vec<String>,
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
    /// Nested items that are not property values.
    pub children: Vec<Item>,
    /// Plain-text value when the item is itself a property value.
    pub value: Option<String>,
    /// Position of the item's element among all items, in document order.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Html { html: String, value: String },
    Item(Box<Item>),
}

impl PropertyValue {
    /// Text form of the value. Nested items yield their `value`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Html { value, .. } => Some(value.as_str()),
            Self::Item(item) => item.value.as_deref(),
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(&**item),
            _ => None,
        }
    }
}

impl Item {
    pub fn has_type(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn property(&self, name: &str) -> &[PropertyValue] {
        self.properties.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First non-empty text value of `name`.
    pub fn first_text(&self, name: &str) -> Option<&str> {
        self.property(name)
            .iter()
            .filter_map(PropertyValue::as_text)
            .find(|s| !s.is_empty())
    }

    fn push(&mut self, name: &str, value: PropertyValue) {
        self.properties
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

impl Document {
    /// All items depth-first in document order. Property items and children
    /// are interleaved as their elements appear.
    pub fn walk(&self) -> Vec<&Item> {
        fn visit<'a>(item: &'a Item, out: &mut Vec<&'a Item>) {
            out.push(item);
            let mut nested: Vec<&Item> = item
                .properties
                .values()
                .flatten()
                .filter_map(PropertyValue::as_item)
                .chain(&item.children)
                .collect();
            nested.sort_by_key(|i| i.position);
            // One element may be the value of several properties.
            nested.dedup_by_key(|i| i.position);
            for n in nested {
                visit(n, out);
            }
        }

        let mut out = Vec::new();
        for item in &self.items {
            visit(item, &mut out);
        }
        out
    }

    pub fn rel(&self, name: &str) -> Option<&str> {
        self.rels.get(name).and_then(|v| v.first()).map(String::as_str)
    }
}

/// Parse `html` fetched from `page`.
pub fn parse(html: &str, page: &Url) -> Document {
    let document = Html::parse_document(html);
    parse_html(&document, page)
}

pub(crate) fn parse_html(document: &Html, page: &Url) -> Document {
    let base = document_base(document, page);
    let items = Parser::new(&base).find_roots(document.root_element());
    Document {
        items,
        rels: parse_rels(document, &base),
    }
}

/// Element nesting below an item root past which properties and nested
/// items are ignored. Source pages are untrusted.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    P,
    U,
    Dt,
    E,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
}

fn item_types(el: &ElementRef) -> Vec<String> {
    let mut types: Vec<String> = el
        .value()
        .classes()
        .filter(|c| c.strip_prefix("h-").is_some_and(valid_name))
        .map(str::to_string)
        .collect();
    types.sort();
    types.dedup();
    types
}

fn property_classes(el: &ElementRef) -> Vec<(Prefix, String)> {
    let mut props = Vec::new();
    for class in el.value().classes() {
        let parsed = if let Some(name) = class.strip_prefix("p-") {
            Some((Prefix::P, name))
        } else if let Some(name) = class.strip_prefix("u-") {
            Some((Prefix::U, name))
        } else if let Some(name) = class.strip_prefix("dt-") {
            Some((Prefix::Dt, name))
        } else {
            class.strip_prefix("e-").map(|name| (Prefix::E, name))
        };
        if let Some((prefix, name)) = parsed {
            if valid_name(name) && !props.iter().any(|(p, n)| *p == prefix && n == name) {
                props.push((prefix, name.to_string()));
            }
        }
    }
    props
}

fn element_children<'a>(el: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

struct Parser<'u> {
    base: &'u Url,
    next_position: usize,
}

impl<'u> Parser<'u> {
    fn new(base: &'u Url) -> Self {
        Self {
            base,
            next_position: 0,
        }
    }

    /// Top-level items in document order. Iterative, so arbitrarily deep
    /// markup around the items is fine.
    fn find_roots(&mut self, root: ElementRef) -> Vec<Item> {
        let mut items = Vec::new();
        let mut stack = vec![root];
        while let Some(el) = stack.pop() {
            if item_types(&el).is_empty() {
                stack.extend(element_children(&el).into_iter().rev());
            } else {
                items.push(self.parse_item(el, 0));
            }
        }
        items
    }

    fn parse_item(&mut self, el: ElementRef, depth: usize) -> Item {
        let mut item = Item {
            types: item_types(&el),
            position: self.next_position,
            ..Default::default()
        };
        self.next_position += 1;
        self.parse_properties(el, &mut item, depth);
        imply_properties(el, self.base, &mut item);
        item
    }

    fn parse_properties(&mut self, el: ElementRef, item: &mut Item, depth: usize) {
        if depth >= MAX_DEPTH {
            return;
        }
        let base = self.base;
        for child in element_children(&el) {
            let props = property_classes(&child);

            if !item_types(&child).is_empty() {
                let nested = self.parse_item(child, depth + 1);
                if props.is_empty() {
                    item.children.push(nested);
                } else {
                    for (prefix, name) in &props {
                        let mut value = nested.clone();
                        value.value = Some(nested_value(*prefix, &nested, child, base));
                        item.push(name, PropertyValue::Item(Box::new(value)));
                    }
                }
                continue;
            }

            for (prefix, name) in &props {
                let value = match prefix {
                    Prefix::P => PropertyValue::Text(plain_value(child)),
                    Prefix::U => PropertyValue::Text(url_value(child, base)),
                    Prefix::Dt => PropertyValue::Text(datetime_value(child)),
                    Prefix::E => PropertyValue::Html {
                        html: child.inner_html().trim().to_string(),
                        value: text_of(child),
                    },
                };
                item.push(name, value);
            }
            self.parse_properties(child, item, depth + 1);
        }
    }
}

fn nested_value(prefix: Prefix, nested: &Item, el: ElementRef, base: &Url) -> String {
    let from_item = match prefix {
        Prefix::P => nested.first_text("name"),
        Prefix::U => nested.first_text("url"),
        Prefix::Dt | Prefix::E => None,
    };
    match from_item {
        Some(v) => v.to_string(),
        None if prefix == Prefix::U => url_value(el, base),
        None => text_of(el),
    }
}

fn text_of(el: ElementRef) -> String {
    let text: String = el.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}

fn resolve(value: &str, base: &Url) -> String {
    base.join(value.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| value.trim().to_string())
}

fn plain_value(el: ElementRef) -> String {
    let found = match el.value().name() {
        "abbr" | "link" => attr(&el, "title"),
        "data" | "input" => attr(&el, "value"),
        "img" | "area" => attr(&el, "alt"),
        _ => None,
    };
    found
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| text_of(el))
}

fn url_value(el: ElementRef, base: &Url) -> String {
    let found = match el.value().name() {
        "a" | "area" | "link" => attr(&el, "href"),
        "img" | "audio" | "source" | "iframe" => attr(&el, "src"),
        "video" => attr(&el, "src").or_else(|| attr(&el, "poster")),
        "object" => attr(&el, "data"),
        _ => None,
    };
    if let Some(v) = found {
        return resolve(v, base);
    }
    let found = match el.value().name() {
        "abbr" => attr(&el, "title"),
        "data" | "input" => attr(&el, "value"),
        _ => None,
    };
    found
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| text_of(el))
}

fn datetime_value(el: ElementRef) -> String {
    let found = match el.value().name() {
        "time" | "ins" | "del" => attr(&el, "datetime"),
        "abbr" => attr(&el, "title"),
        "data" | "input" => attr(&el, "value"),
        _ => None,
    };
    found
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| text_of(el))
}

/// The sole element child, if it is not itself an item.
fn only_child<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let kids = element_children(el);
    match kids.as_slice() {
        [only] if item_types(only).is_empty() => Some(*only),
        _ => None,
    }
}

/// `el`, its only child, or its only grandchild, whichever first matches.
fn implied_from<F>(el: &ElementRef, pick: F) -> Option<String>
where
    F: Fn(&ElementRef) -> Option<String>,
{
    if let Some(v) = pick(el) {
        return Some(v);
    }
    let child = only_child(el)?;
    if let Some(v) = pick(&child) {
        return Some(v);
    }
    let grandchild = only_child(&child)?;
    pick(&grandchild)
}

fn imply_properties(el: ElementRef, base: &Url, item: &mut Item) {
    let has_nested = !item.children.is_empty()
        || item
            .properties
            .values()
            .flatten()
            .any(|v| matches!(v, PropertyValue::Item(_)));
    if has_nested {
        return;
    }

    if !item.has_property("name") && !has_text_properties(el, 0) {
        let name = match el.value().name() {
            "img" | "area" => attr(&el, "alt").map(str::to_string),
            "abbr" => attr(&el, "title").map(str::to_string),
            _ => None,
        }
        .or_else(|| {
            only_child(&el).and_then(|c| match c.value().name() {
                "img" | "area" if text_of(el).is_empty() => attr(&c, "alt").map(str::to_string),
                "abbr" => attr(&c, "title").map(str::to_string),
                _ => None,
            })
        })
        .unwrap_or_else(|| text_of(el));
        item.push("name", PropertyValue::Text(name.trim().to_string()));
    }

    if !item.has_property("photo") {
        let photo = implied_from(&el, |e| match e.value().name() {
            "img" => attr(e, "src").map(|v| resolve(v, base)),
            "object" => attr(e, "data").map(|v| resolve(v, base)),
            _ => None,
        });
        if let Some(photo) = photo {
            item.push("photo", PropertyValue::Text(photo));
        }
    }

    if !item.has_property("url") {
        let url = implied_from(&el, |e| match e.value().name() {
            "a" | "area" => attr(e, "href").map(|v| resolve(v, base)),
            _ => None,
        });
        if let Some(url) = url {
            item.push("url", PropertyValue::Text(url));
        }
    }
}

/// Whether any descendant (outside nested items) carries a `p-` or `e-` class.
fn has_text_properties(el: ElementRef, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    element_children(&el).into_iter().any(|child| {
        property_classes(&child)
            .iter()
            .any(|(p, _)| matches!(p, Prefix::P | Prefix::E))
            || (item_types(&child).is_empty() && has_text_properties(child, depth + 1))
    })
}

fn parse_rels(document: &Html, base: &Url) -> BTreeMap<String, Vec<String>> {
    let mut rels: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Ok(selector) = Selector::parse("a[rel][href], area[rel][href], link[rel][href]") else {
        return rels;
    };
    for el in document.select(&selector) {
        let (Some(rel), Some(href)) = (attr(&el, "rel"), attr(&el, "href")) else {
            continue;
        };
        let href = resolve(href, base);
        for token in rel.split_whitespace() {
            let urls = rels.entry(token.to_ascii_lowercase()).or_default();
            if !urls.contains(&href) {
                urls.push(href.clone());
            }
        }
    }
    rels
}
