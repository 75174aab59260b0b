use crate::config::CollectorConfig;
use crate::error::{Error, Result};
use crate::feed::discovery;
use crate::feed::parser::FeedParser;
use crate::feed::{Category, ParsedFeed};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout_duration: Duration,
    user_agent: String,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .build()
            .map_err(|e| Error::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_duration: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (RSS-Discovery/1.0)".to_string(),
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        Ok(Self::new()?
            .with_timeout(config.timeout_duration())
            .with_user_agent(config.user_agent.clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Fetches `page_url` and returns the feed URLs it advertises.
    pub async fn discover_feeds(&self, page_url: &str) -> Result<Vec<String>> {
        debug!("Discovering feeds on: {}", page_url);

        let base = url::Url::parse(page_url)
            .map_err(|e| Error::InvalidUrl(format!("Invalid URL {}: {}", page_url, e)))?;
        let body = self.fetch_text(page_url).await?;
        let feeds = discovery::find_feed_links(&body, &base);

        debug!("Discovered {} feed links on {}", feeds.len(), page_url);
        Ok(feeds)
    }

    /// Fetches a page that must be served as HTML.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.checked_response(url).await?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        if !content_type.contains("text/html") {
            return Err(Error::ContentType(format!(
                "Expected text/html from {}, got {}",
                url, content_type
            )));
        }

        read_text(response, url).await
    }

    /// Fetches any page body as text after checking the status.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.checked_response(url).await?;
        read_text(response, url).await
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed> {
        debug!("Fetching feed from: {}", url);

        let parser = FeedParser::new();
        parser.validate_feed_url(url)?;

        let response = self.checked_response(url).await?;
        let content = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, url))?;

        debug!("Downloaded {} bytes from {}", content.len(), url);

        parser.parse_feed(std::io::Cursor::new(content))
    }

    /// Fetches the category feeds concurrently; results keep the input order.
    pub async fn fetch_category_feeds(
        &self,
        feeds: &[(Category, String)],
    ) -> Vec<(Category, Result<ParsedFeed>)> {
        let futures = feeds.iter().map(|(category, url)| async move {
            (*category, self.fetch_feed(url).await)
        });

        futures::future::join_all(futures).await
    }

    async fn checked_response(&self, url: &str) -> Result<Response> {
        let response = timeout(self.timeout_duration, self.fetch_response(url))
            .await
            .map_err(|_| Error::Timeout(format!("Request to {} timed out", url)))??;

        if !response.status().is_success() {
            return Err(Error::HttpError(format!(
                "HTTP {} for {}: {}",
                response.status().as_u16(),
                url,
                response.status().canonical_reason().unwrap_or("Unknown error")
            )));
        }

        Ok(response)
    }

    async fn fetch_response(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            // Covers the body as well as the headers.
            .timeout(self.timeout_duration)
            .send()
            .await
            .map_err(|e| transport_error(e, url))?;

        Ok(response)
    }
}

async fn read_text(response: Response, url: &str) -> Result<String> {
    response.text().await.map_err(|e| transport_error(e, url))
}

fn transport_error(err: reqwest::Error, url: &str) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("Request to {} timed out", url))
    } else {
        Error::HttpError(format!("Request to {} failed: {}", url, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>Test Feed</title>
        <link>https://example.com</link>
        <description>A test feed</description>
        <item>
            <title>Test Article</title>
            <link>https://example.com/article?idx=1</link>
        </item>
    </channel>
</rss>"#;

    #[tokio::test]
    async fn test_fetch_valid_feed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS_RESPONSE)
                    .insert_header("content-type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let feed = fetcher
            .fetch_feed(&format!("{}/feed.xml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(feed.title, "Test Feed");
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].link, "https://example.com/article?idx=1");
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/notfound.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let result = fetcher
            .fetch_feed(&format!("{}/notfound.xml", mock_server.uri()))
            .await;

        if let Err(Error::HttpError(msg)) = result {
            assert!(msg.contains("404"));
        } else {
            panic!("Expected HttpError");
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_string(VALID_RSS_RESPONSE),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap().with_timeout(Duration::from_millis(100));
        let result = fetcher
            .fetch_feed(&format!("{}/slow.xml", mock_server.uri()))
            .await;

        if let Err(Error::Timeout(msg)) = result {
            assert!(msg.contains("timed out"));
        } else {
            panic!("Expected Timeout error");
        }
    }

    #[tokio::test]
    async fn test_discover_feeds_sends_user_agent() {
        let mock_server = MockServer::start().await;
        let page = r#"<html><head>
            <link rel="alternate" type="application/rss+xml" href="/rss/total.xml">
            <link rel="alternate" type="application/rss+xml" href="/rss/total.xml">
        </head></html>"#;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("User-Agent", "CustomBot/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page)
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new()
            .unwrap()
            .with_user_agent("CustomBot/1.0".to_string());
        let feeds = fetcher
            .discover_feeds(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(feeds, vec![format!("{}/rss/total.xml", mock_server.uri())]);
    }

    #[tokio::test]
    async fn test_discover_feeds_propagates_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let result = fetcher.discover_feeds(&format!("{}/", mock_server.uri())).await;
        assert!(matches!(result, Err(Error::HttpError(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_html_rejects_non_html() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS_RESPONSE)
                    .insert_header("content-type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let result = fetcher.fetch_html(&format!("{}/rss", mock_server.uri())).await;
        assert!(matches!(result, Err(Error::ContentType(_))));
    }

    #[tokio::test]
    async fn test_fetch_category_feeds_keeps_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/policy.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS_RESPONSE.replace("Test Feed", "Policy"))
                    .insert_header("content-type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/tech.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let feeds = vec![
            (Category::Policy, format!("{}/policy.xml", mock_server.uri())),
            (Category::Tech, format!("{}/tech.xml", mock_server.uri())),
        ];

        let results = fetcher.fetch_category_feeds(&feeds).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, Category::Policy);
        assert_eq!(results[0].1.as_ref().unwrap().title, "Policy");
        assert_eq!(results[1].0, Category::Tech);
        assert!(results[1].1.is_err());
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n<html>",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let fetcher = Fetcher::new().unwrap().with_timeout(Duration::from_millis(300));
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            fetcher.fetch_text(&format!("http://{}/", addr)),
        )
        .await
        .expect("body read was not bounded by the fetch timeout");

        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_schemes() {
        let fetcher = Fetcher::new().unwrap();

        for url in ["ftp://example.com/feed.xml", "file:///local/feed.xml"] {
            let result = fetcher.fetch_feed(url).await;
            assert!(matches!(result, Err(Error::InvalidUrl(_))), "{}", url);
        }
    }
}
