use tracing::{debug, info};

use crate::config::{CollectorConfig, FeedMapping, FeedSource};
use crate::error::{Error, Result};
use crate::feed::discovery;
use crate::feed::fetcher::Fetcher;
use crate::feed::parser::parse_idx;
use crate::feed::{CandidateArticle, Category};

/// Walks the site and turns its category feeds into candidate articles.
///
/// Any failure aborts the whole collection; nothing is retried.
pub struct Collector {
    fetcher: Fetcher,
    config: CollectorConfig,
    feeds: FeedMapping,
}

impl Collector {
    pub fn new(fetcher: Fetcher, config: CollectorConfig, feeds: FeedMapping) -> Self {
        Self {
            fetcher,
            config,
            feeds,
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config.collector)?;
        Ok(Self::new(fetcher, config.collector.clone(), config.feeds.clone()))
    }

    /// Produces candidates in category order, entries in feed order.
    pub async fn collect(&self) -> Result<Vec<CandidateArticle>> {
        let feed_urls = self.resolve_feed_urls().await?;
        let mut candidates = Vec::new();

        for (category, result) in self.fetcher.fetch_category_feeds(&feed_urls).await {
            let feed = result?;
            info!("Parsed {} entries for category {}", feed.entries.len(), category);

            for entry in feed.entries {
                let published_date = self.scrape_published_date(&entry.link).await?;
                candidates.push(CandidateArticle {
                    natural_key: parse_idx(&entry.link),
                    title: entry.title,
                    link: entry.link,
                    category: category.to_string(),
                    published_date,
                });
            }
        }

        info!("Collected {} candidate articles", candidates.len());
        Ok(candidates)
    }

    /// Fetches the HTML page behind the first feed the site root advertises.
    /// That page lists the category feeds as `<input>` values.
    pub async fn fetch_feed_page(&self) -> Result<String> {
        let discovered = self.fetcher.discover_feeds(&self.config.site_url).await?;
        let first = discovered.first().ok_or_else(|| {
            Error::NotFound(format!("No feed links found on {}", self.config.site_url))
        })?;

        debug!("Scanning feed page {}", first);
        self.fetcher.fetch_html(first).await
    }

    /// Maps every configured category to a feed URL.
    pub fn select_feeds(&self, page_html: Option<&str>) -> Result<Vec<(Category, String)>> {
        let inputs = page_html.map(discovery::find_input_feed_urls).unwrap_or_default();

        self.feeds
            .entries()
            .iter()
            .map(|(category, source)| {
                let url = match source {
                    FeedSource::Url(url) => url.clone(),
                    FeedSource::Position(position) => inputs.get(*position).cloned().ok_or_else(|| {
                        Error::Scrape(format!(
                            "Feed page lists {} feed inputs; none at position {} for {}",
                            inputs.len(),
                            position,
                            category
                        ))
                    })?,
                };
                Ok((*category, url))
            })
            .collect()
    }

    pub async fn scrape_published_date(&self, article_url: &str) -> Result<String> {
        let html = self.fetcher.fetch_text(article_url).await?;
        discovery::extract_published_date(
            &html,
            &self.config.date_element_id,
            self.config.date_prefix_chars,
        )
    }

    async fn resolve_feed_urls(&self) -> Result<Vec<(Category, String)>> {
        let needs_page = self
            .feeds
            .entries()
            .iter()
            .any(|(_, source)| matches!(source, FeedSource::Position(_)));

        if needs_page {
            let page = self.fetch_feed_page().await?;
            self.select_feeds(Some(&page))
        } else {
            self.select_feeds(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(feeds: FeedMapping) -> Collector {
        Collector::new(Fetcher::new().unwrap(), CollectorConfig::default(), feeds)
    }

    fn input_page(count: usize) -> String {
        let inputs: String = (0..count)
            .map(|i| format!(r#"<input type="text" value="https://www.example.com/rss/{}.xml">"#, i))
            .collect();
        format!("<html><body><form>{}</form></body></html>", inputs)
    }

    #[test]
    fn test_select_feeds_default_positions() {
        let collector = collector(FeedMapping::default());
        let page = input_page(10);

        let feeds = collector.select_feeds(Some(&page)).unwrap();
        assert_eq!(
            feeds,
            vec![
                (Category::Policy, "https://www.example.com/rss/6.xml".to_string()),
                (Category::Accident, "https://www.example.com/rss/5.xml".to_string()),
                (Category::Business, "https://www.example.com/rss/7.xml".to_string()),
                (Category::International, "https://www.example.com/rss/8.xml".to_string()),
                (Category::Tech, "https://www.example.com/rss/9.xml".to_string()),
            ]
        );
    }

    #[test]
    fn test_select_feeds_too_few_inputs() {
        let collector = collector(FeedMapping::default());
        let page = input_page(7);

        let result = collector.select_feeds(Some(&page));
        assert!(matches!(result, Err(Error::Scrape(msg)) if msg.contains("position")));
    }

    #[test]
    fn test_select_feeds_explicit_urls_need_no_page() {
        let mapping = FeedMapping::new(vec![(
            Category::Tech,
            FeedSource::Url("https://feeds.example.com/tech.xml".to_string()),
        )]);
        let collector = collector(mapping);

        let feeds = collector.select_feeds(None).unwrap();
        assert_eq!(
            feeds,
            vec![(Category::Tech, "https://feeds.example.com/tech.xml".to_string())]
        );
    }
}
