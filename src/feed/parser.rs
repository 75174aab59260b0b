use crate::error::{Error, Result};
use crate::feed::{ParsedEntry, ParsedFeed};
use feed_rs::parser as feed_parser;
use std::io::BufRead;
use tracing::warn;

pub struct FeedParser;

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_feed<R: BufRead>(&self, reader: R) -> Result<ParsedFeed> {
        let feed = feed_parser::parse(reader)
            .map_err(|e| Error::FeedParse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content).unwrap_or_else(|| "Untitled Feed".to_string());

        let entries = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let title = entry.title.map(|t| t.content).unwrap_or_else(|| "Untitled".to_string());
                match entry.links.first() {
                    Some(link) => Some(ParsedEntry {
                        title,
                        link: link.href.clone(),
                    }),
                    None => {
                        warn!("Skipping feed entry without a link: {}", title);
                        None
                    }
                }
            })
            .collect();

        Ok(ParsedFeed { title, entries })
    }

    pub fn validate_feed_url(&self, url: &str) -> Result<()> {
        let parsed_url = url::Url::parse(url)
            .map_err(|e| Error::InvalidUrl(format!("Invalid URL: {}", e)))?;

        match parsed_url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(Error::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
        }
    }
}

/// Extracts the article's natural key, the `idx` query parameter of its link.
///
/// Returns `None` when the link does not parse or has no non-blank `idx`
/// parameter. Blank values are skipped; of the rest the first one wins.
pub fn parse_idx(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(key, value)| key == "idx" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
