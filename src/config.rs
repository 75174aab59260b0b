use ini::{Ini, Properties};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::feed::Category;

const DATABASE_SECTION: &str = "database";
const COLLECTOR_SECTION: &str = "collector";
const FEEDS_SECTION: &str = "feeds";

const MYSQL_REQUIRED_KEYS: &[&str] = &["host", "port", "db", "user", "password"];
const SQLITE_REQUIRED_KEYS: &[&str] = &["db"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub collector: CollectorConfig,
    pub feeds: FeedMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    MySql,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    /// Database name, or the database file path for SQLite.
    pub db: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub site_url: String,
    pub user_agent: String,
    pub timeout: u64,
    pub date_element_id: String,
    pub date_prefix_chars: usize,
}

/// Where the feed for a category comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Position among the `<input value="http...">` URLs of the feed page.
    Position(usize),
    /// A feed URL used as is.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMapping {
    entries: Vec<(Category, FeedSource)>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_ini_str(&content)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_ini_str(content: &str) -> Result<Self> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse INI: {}", e)))?;

        let database = DatabaseConfig::from_section(ini.section(Some(DATABASE_SECTION)))?;
        let collector = CollectorConfig::from_section(ini.section(Some(COLLECTOR_SECTION)))?;
        let feeds = FeedMapping::from_section(ini.section(Some(FEEDS_SECTION)))?;

        let config = Self {
            database,
            collector,
            feeds,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let site = url::Url::parse(&self.collector.site_url)
            .map_err(|_| Error::InvalidUrl(self.collector.site_url.clone()))?;
        if !matches!(site.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "Site URL must be http(s): {}",
                self.collector.site_url
            )));
        }

        if self.collector.timeout == 0 {
            return Err(Error::Invalid("Collector timeout must be greater than 0".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Invalid("max_connections must be greater than 0".to_string()));
        }

        Ok(())
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(password) = lookup("BOAN_RSS_DB_PASSWORD") {
            self.database.password = password;
        }

        if let Some(site_url) = lookup("BOAN_RSS_SITE_URL") {
            self.collector.site_url = site_url;
        }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("config").join("db.ini")
    }
}

impl DatabaseConfig {
    fn from_section(section: Option<&Properties>) -> Result<Self> {
        let section = section.ok_or_else(|| Error::MissingConfigKeys {
            section: DATABASE_SECTION.to_string(),
            keys: MYSQL_REQUIRED_KEYS.iter().map(|k| k.to_string()).collect(),
        })?;

        let driver = match section.get("driver").map(str::trim) {
            None | Some("") | Some("mysql") => Driver::MySql,
            Some("sqlite") => Driver::Sqlite,
            Some(other) => {
                return Err(Error::Config(format!("Unsupported database driver: {}", other)));
            }
        };

        let required = match driver {
            Driver::MySql => MYSQL_REQUIRED_KEYS,
            Driver::Sqlite => SQLITE_REQUIRED_KEYS,
        };
        let missing: Vec<String> = required
            .iter()
            .filter(|key| section.get(**key).map_or(true, |v| v.trim().is_empty()))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingConfigKeys {
                section: DATABASE_SECTION.to_string(),
                keys: missing,
            });
        }

        let text = |key: &str| section.get(key).unwrap_or_default().trim().to_string();

        let port = match driver {
            Driver::MySql => text("port")
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("Invalid database port: {}", e)))?,
            Driver::Sqlite => 0,
        };

        let max_connections = match section.get("max_connections") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|e| Error::Config(format!("Invalid max_connections: {}", e)))?,
            None => default_max_connections(),
        };

        Ok(Self {
            driver,
            host: text("host"),
            port,
            db: text("db"),
            user: text("user"),
            // Passwords keep their surrounding whitespace.
            password: section.get("password").unwrap_or_default().to_string(),
            max_connections,
        })
    }
}

impl CollectorConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn from_section(section: Option<&Properties>) -> Result<Self> {
        let mut config = Self::default();
        let Some(section) = section else {
            return Ok(config);
        };

        if let Some(site_url) = section.get("site_url") {
            config.site_url = site_url.trim().to_string();
        }
        if let Some(user_agent) = section.get("user_agent") {
            config.user_agent = user_agent.trim().to_string();
        }
        if let Some(timeout) = section.get("timeout") {
            config.timeout = timeout
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid collector timeout: {}", e)))?;
        }
        if let Some(id) = section.get("date_element_id") {
            config.date_element_id = id.trim().to_string();
        }
        if let Some(chars) = section.get("date_prefix_chars") {
            config.date_prefix_chars = chars
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid date_prefix_chars: {}", e)))?;
        }

        Ok(config)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            date_element_id: default_date_element_id(),
            date_prefix_chars: default_date_prefix_chars(),
        }
    }
}

impl FeedMapping {
    pub fn new(entries: Vec<(Category, FeedSource)>) -> Self {
        Self { entries }
    }

    /// Category to source pairs in ingestion order.
    pub fn entries(&self) -> &[(Category, FeedSource)] {
        &self.entries
    }

    pub fn source_for(&self, category: Category) -> Option<&FeedSource> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, source)| source)
    }

    fn from_section(section: Option<&Properties>) -> Result<Self> {
        let mut mapping = Self::default();
        let Some(section) = section else {
            return Ok(mapping);
        };

        for (key, value) in section.iter() {
            let category: Category = key.trim().parse()?;
            let source = parse_feed_source(value)?;
            if let Some(entry) = mapping.entries.iter_mut().find(|(c, _)| *c == category) {
                entry.1 = source;
            }
        }

        Ok(mapping)
    }
}

impl Default for FeedMapping {
    fn default() -> Self {
        Self {
            entries: Category::ALL
                .iter()
                .map(|category| (*category, FeedSource::Position(category.default_position())))
                .collect(),
        }
    }
}

fn parse_feed_source(value: &str) -> Result<FeedSource> {
    let value = value.trim();
    if let Ok(position) = value.parse::<usize>() {
        return Ok(FeedSource::Position(position));
    }

    let url = url::Url::parse(value).map_err(|_| Error::InvalidUrl(value.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(FeedSource::Url(value.to_string())),
        scheme => Err(Error::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
    }
}

fn default_max_connections() -> u32 { 1 }
fn default_site_url() -> String { "https://www.boannews.com/".to_string() }
fn default_user_agent() -> String { "Mozilla/5.0 (RSS-Discovery/1.0)".to_string() }
fn default_timeout() -> u64 { 10 }
fn default_date_element_id() -> String { "news_util01".to_string() }
fn default_date_prefix_chars() -> usize { 5 }
