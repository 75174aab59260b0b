//! HTML heuristics for locating feeds and article metadata.

use select::document::Document;
use select::predicate::{Attr, Name, Predicate};
use std::collections::HashSet;
use url::Url;

use crate::error::{Error, Result};

const FEED_LINK_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/rdf+xml",
    "text/xml",
    "application/xml",
];

const FEED_HREF_HINTS: &[&str] = &["rss", "atom", "feed"];
const FEED_HREF_SUFFIXES: &[&str] = &[".rss", ".xml"];

/// Finds feed URLs advertised by a page, resolved against `base`.
///
/// `<link rel="alternate">` tags with a feed media type take priority. Only when
/// none exist are `<a href>` targets mentioning rss/atom/feed or ending in
/// `.rss`/`.xml` considered. The result keeps first-seen order without duplicates.
pub fn find_feed_links(html: &str, base: &Url) -> Vec<String> {
    let document = Document::from(html);

    let mut feeds: Vec<String> = document
        .find(Name("link"))
        .filter(|node| node.attr("rel").map_or(false, is_alternate))
        .filter_map(|node| {
            let kind = node.attr("type").unwrap_or_default().trim().to_lowercase();
            let href = node.attr("href").unwrap_or_default().trim();
            if href.is_empty() || !FEED_LINK_TYPES.contains(&kind.as_str()) {
                return None;
            }
            resolve(base, href)
        })
        .collect();

    if feeds.is_empty() {
        feeds = document
            .find(Name("a"))
            .filter_map(|node| node.attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .filter(|href| {
                let lower = href.to_lowercase();
                FEED_HREF_HINTS.iter().any(|hint| lower.contains(hint))
                    || FEED_HREF_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
            })
            .filter_map(|href| resolve(base, href))
            .collect();
    }

    dedup_preserving_order(feeds)
}

/// Collects the `value` of every `<input>` whose value starts with "http", in
/// document order. The site lists its category feeds this way.
pub fn find_input_feed_urls(html: &str) -> Vec<String> {
    Document::from(html)
        .find(Name("input"))
        .filter_map(|node| node.attr("value"))
        .filter(|value| value.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Reads the publication date from an article page.
///
/// The text of the first `<div id=element_id>` is collected with every text
/// node trimmed, then its first `prefix_chars` characters (a label such as
/// "입력 : ") are dropped.
pub fn extract_published_date(html: &str, element_id: &str, prefix_chars: usize) -> Result<String> {
    let document = Document::from(html);
    let node = document
        .find(Name("div").and(Attr("id", element_id)))
        .next()
        .ok_or_else(|| Error::Scrape(format!("No div#{} element on article page", element_id)))?;

    let text: String = node
        .descendants()
        .filter_map(|n| n.as_text())
        .map(str::trim)
        .collect();

    Ok(text.chars().skip(prefix_chars).collect())
}

fn is_alternate(rel: &str) -> bool {
    rel.split_whitespace().any(|token| token.eq_ignore_ascii_case("alternate"))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|url| url.to_string())
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|url| seen.insert(url.clone())).collect()
}
