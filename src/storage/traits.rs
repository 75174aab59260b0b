use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::feed::{CandidateArticle, Category};

/// Handle to the relational store holding articles and their categories.
///
/// The ingestor only talks to the store through this trait, so one handle is
/// opened per run and passed in explicitly.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Looks up an article id by natural key.
    ///
    /// Comparison is null-safe: a missing key matches an article stored
    /// without a key.
    async fn find_article_id(&self, natural_key: Option<&str>) -> Result<Option<i64>>;

    /// Inserts the article in its own transaction and returns the generated id.
    async fn insert_article(&self, article: &CandidateArticle) -> Result<i64>;

    /// Associates an article with the category called `category`, unless that
    /// pair already exists.
    async fn link_category(&self, article_id: i64, category: &str) -> Result<LinkOutcome>;

    /// Row counts for the article and association tables.
    async fn stats(&self) -> Result<StoreStats>;

    /// Verifies that the store answers queries.
    async fn health_check(&self) -> Result<()>;

    async fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    /// No category row carries the requested name; nothing was inserted.
    UnknownCategory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub articles: u64,
    pub links: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub id: i64,
    pub natural_key: Option<String>,
    pub title: String,
    pub link: String,
    pub published_date: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    articles: Vec<StoredArticle>,
    categories: HashMap<String, i64>,
    links: Vec<(i64, i64)>,
}

/// In-process store, used for dry runs and tests.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn with_categories<S: AsRef<str>>(names: &[S]) -> Self {
        let categories = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().to_string(), i as i64 + 1))
            .collect();

        Self {
            state: RwLock::new(MemoryState {
                categories,
                ..MemoryState::default()
            }),
        }
    }

    pub fn articles(&self) -> Vec<StoredArticle> {
        self.state.read().articles.clone()
    }

    /// Category names linked to an article, in insertion order.
    pub fn categories_of(&self, article_id: i64) -> Vec<String> {
        let state = self.state.read();
        state
            .links
            .iter()
            .filter(|(news_id, _)| *news_id == article_id)
            .filter_map(|(_, category_id)| {
                state
                    .categories
                    .iter()
                    .find(|(_, id)| *id == category_id)
                    .map(|(name, _)| name.clone())
            })
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        Self::with_categories(&names)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_article_id(&self, natural_key: Option<&str>) -> Result<Option<i64>> {
        let state = self.state.read();
        Ok(state
            .articles
            .iter()
            .find(|a| a.natural_key.as_deref() == natural_key)
            .map(|a| a.id))
    }

    async fn insert_article(&self, article: &CandidateArticle) -> Result<i64> {
        let mut state = self.state.write();
        let id = state.articles.last().map_or(1, |a| a.id + 1);
        state.articles.push(StoredArticle {
            id,
            natural_key: article.natural_key.clone(),
            title: article.title.clone(),
            link: article.link.clone(),
            published_date: article.published_date.clone(),
        });
        Ok(id)
    }

    async fn link_category(&self, article_id: i64, category: &str) -> Result<LinkOutcome> {
        let mut state = self.state.write();
        if !state.articles.iter().any(|a| a.id == article_id) {
            return Err(Error::NotFound(format!("Article {} does not exist", article_id)));
        }

        let Some(category_id) = state.categories.get(category).copied() else {
            return Ok(LinkOutcome::UnknownCategory);
        };

        if state.links.contains(&(article_id, category_id)) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        state.links.push((article_id, category_id));
        Ok(LinkOutcome::Linked)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        Ok(StoreStats {
            articles: state.articles.len() as u64,
            links: state.links.len() as u64,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: Option<&str>, title: &str) -> CandidateArticle {
        CandidateArticle {
            natural_key: key.map(str::to_string),
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            category: "tech".to_string(),
            published_date: "2024-03-15".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::default();

        let id = store.insert_article(&candidate(Some("1"), "A")).await.unwrap();
        assert_eq!(store.find_article_id(Some("1")).await.unwrap(), Some(id));
        assert_eq!(store.find_article_id(Some("2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key_matches_missing_key() {
        let store = MemoryStore::default();

        let id = store.insert_article(&candidate(None, "A")).await.unwrap();
        assert_eq!(store.find_article_id(None).await.unwrap(), Some(id));
        assert_eq!(store.find_article_id(Some("1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_link_category_outcomes() {
        let store = MemoryStore::default();
        let id = store.insert_article(&candidate(Some("1"), "A")).await.unwrap();

        assert_eq!(store.link_category(id, "tech").await.unwrap(), LinkOutcome::Linked);
        assert_eq!(store.link_category(id, "tech").await.unwrap(), LinkOutcome::AlreadyLinked);
        assert_eq!(store.link_category(id, "sports").await.unwrap(), LinkOutcome::UnknownCategory);
        assert!(store.link_category(id + 10, "tech").await.is_err());

        assert_eq!(store.categories_of(id), vec!["tech"]);
        assert_eq!(store.stats().await.unwrap(), StoreStats { articles: 1, links: 1 });
    }
}
