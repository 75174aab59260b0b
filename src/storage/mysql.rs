use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::feed::CandidateArticle;
use crate::storage::traits::{ArticleStore, LinkOutcome, StoreStats};

/// Production store. Expects `news_config`, `category` and `news_category`
/// to exist with the category rows already filled in.
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.db)
            .username(&config.user)
            .password(&config.password)
            .charset("utf8mb4");

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::StoreConnection(format!(
                    "Failed to connect to mysql://{}@{}:{}/{}: {}",
                    config.user, config.host, config.port, config.db, e
                ))
            })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ArticleStore for MySqlStore {
    async fn find_article_id(&self, natural_key: Option<&str>) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM news_config WHERE idx <=> ? ORDER BY id LIMIT 1",
        )
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
                Ok(result.last_insert_id() as i64)
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
