use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::collector::Collector;
use crate::feed::CandidateArticle;
use crate::logging::{init_logging, LogSettings};
use crate::storage::{open_store, Ingestor};

#[derive(Parser, Debug)]
#[command(name = "boan-rss")]
#[command(about = "Collect news articles from category RSS feeds into a relational store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BOAN_RSS_CONFIG", default_value = "config/db.ini")]
    pub config: PathBuf,

    /// Directory for the rotating log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Also print log lines to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Collect and print candidates as JSON lines without touching the store
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let _guard = init_logging(&LogSettings {
            directory: self.log_dir.clone(),
            debug: self.debug,
            verbose: self.verbose,
            ..LogSettings::default()
        })?;

        let result = self.run_pass().await;
        if let Err(e) = &result {
            error!("Run aborted [{}]: {}", e.error_code(), e);
        }
        result
    }

    /// One collect-and-ingest pass.
    async fn run_pass(&self) -> Result<()> {
        let config = Config::load_with_env(&self.config)?;
        info!("Loaded configuration from {}", self.config.display());

        let collector = Collector::from_config(&config)?;
        let candidates = collector.collect().await?;

        if self.dry_run {
            return print_candidates(&candidates);
        }

        let store = open_store(&config.database).await?;
        let ingested = Ingestor::new(store.as_ref()).ingest_all(&candidates).await;
        store.close().await;
        ingested.map(|_| ())
    }
}

fn print_candidates(candidates: &[CandidateArticle]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for candidate in candidates {
        let line = serde_json::to_string(candidate)
            .map_err(|e| Error::Invalid(format!("Failed to serialize candidate: {}", e)))?;
        writeln!(out, "{}", line)?;
    }

    Ok(())
}
