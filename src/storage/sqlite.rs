use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::feed::{CandidateArticle, Category};
use crate::storage::traits::{ArticleStore, LinkOutcome, StoreStats};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news_config (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        idx TEXT,
        title TEXT NOT NULL,
        link TEXT NOT NULL,
        from_date TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS news_config_idx ON news_config (idx)",
    r#"
    CREATE TABLE IF NOT EXISTS category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS news_category (
        news_id INTEGER NOT NULL REFERENCES news_config (id),
        category_id INTEGER NOT NULL REFERENCES category (id),
        UNIQUE (news_id, category_id)
    )
    "#,
];

/// File-backed store for local runs and tests.
///
/// Unlike the MySQL store it creates its own tables and category rows.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::StoreConnection(format!("Failed to open {}: {}", db_path.display(), e))
            })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        debug!("Schema ready in {}", db_path.display());
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        for category in Category::ALL {
            sqlx::query("INSERT OR IGNORE INTO category (name) VALUES (?)")
                .bind(category.as_str())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    #[cfg(test)]
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_article_id(&self, natural_key: Option<&str>) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM news_config WHERE idx IS ? ORDER BY id LIMIT 1")
            .bind(natural_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn insert_article(&self, article: &CandidateArticle) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO news_config (idx, title, link, from_date) VALUES (?, ?, ?, ?)",
        )
        .bind(article.natural_key.as_deref())
        .bind(&article.title)
        .bind(&article.link)
        .bind(&article.published_date)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(result) => {
                tx.commit().await?;
                Ok(result.last_insert_rowid())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed insert also failed: {}", rollback_err);
                }
                Err(err.into())
            }
        }
    }

    async fn link_category(&self, article_id: i64, category: &str) -> Result<LinkOutcome> {
        let mut tx = self.pool.begin().await?;

        let outcome = async {
            let category_id = sqlx::query_scalar::<_, i64>("SELECT id FROM category WHERE name = ?")
                .bind(category)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(category_id) = category_id else {
                return Ok(LinkOutcome::UnknownCategory);
            };

            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT news_id FROM news_category WHERE news_id = ? AND category_id = ?",
            )
            .bind(article_id)
            .bind(category_id)
            .fetch_optional(&mut *tx)
            .await?;
            if existing.is_some() {
                return Ok(LinkOutcome::AlreadyLinked);
            }

            sqlx::query("INSERT INTO news_category (news_id, category_id) VALUES (?, ?)")
                .bind(article_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            Ok::<_, sqlx::Error>(LinkOutcome::Linked)
        }
        .await;

        match outcome {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed link also failed: {}", rollback_err);
                }
                Err(err.into())
            }
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let articles = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_config")
            .fetch_one(&self.pool)
            .await?;
        let links = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_category")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            articles: articles as u64,
            links: links as u64,
        })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
