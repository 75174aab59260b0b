pub mod ingest;
pub mod mysql;
pub mod sqlite;
pub mod traits;

pub use ingest::{IngestOutcome, IngestReport, IngestStage, Ingestor};
pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;
pub use traits::{ArticleStore, LinkOutcome, MemoryStore, StoreStats, StoredArticle};

use std::path::Path;
use tracing::info;

use crate::config::{DatabaseConfig, Driver};
use crate::error::Result;

/// Opens the store named by the `[database]` section and checks that it answers.
pub async fn open_store(config: &DatabaseConfig) -> Result<Box<dyn ArticleStore>> {
    let store: Box<dyn ArticleStore> = match config.driver {
        Driver::MySql => Box::new(MySqlStore::connect(config).await?),
        Driver::Sqlite => {
            Box::new(SqliteStore::open(Path::new(&config.db), config.max_connections).await?)
        }
    };

    store.health_check().await?;
    info!("Connected to {:?} store {}", config.driver, config.db);
    Ok(store)
}
