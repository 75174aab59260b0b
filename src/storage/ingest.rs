use std::fmt;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::feed::CandidateArticle;
use crate::storage::traits::{ArticleStore, LinkOutcome};

/// Step of the per-record workflow that rejected a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Lookup,
    Insert,
    Link,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Lookup => "lookup",
            IngestStage::Insert => "insert",
            IngestStage::Link => "link",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new article row was written.
    Inserted { article_id: i64, link: LinkOutcome },
    /// The natural key was already stored; only the category link was considered.
    Duplicate { article_id: i64, link: LinkOutcome },
    /// The record was skipped. `article_id` is set when the article row exists
    /// but linking it failed.
    Failed {
        stage: IngestStage,
        article_id: Option<i64>,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub links_added: usize,
    pub links_existing: usize,
    pub unknown_categories: usize,
    pub failures: usize,
}

impl IngestReport {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        self.seen += 1;
        match outcome {
            IngestOutcome::Inserted { link, .. } => {
                self.inserted += 1;
                self.record_link(*link);
            }
            IngestOutcome::Duplicate { link, .. } => {
                self.duplicates += 1;
                self.record_link(*link);
            }
            IngestOutcome::Failed { .. } => self.failures += 1,
        }
    }

    fn record_link(&mut self, link: LinkOutcome) {
        match link {
            LinkOutcome::Linked => self.links_added += 1,
            LinkOutcome::AlreadyLinked => self.links_existing += 1,
            LinkOutcome::UnknownCategory => self.unknown_categories += 1,
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seen, {} inserted, {} duplicates, {} links added, {} links present, {} unknown categories, {} failed",
            self.seen,
            self.inserted,
            self.duplicates,
            self.links_added,
            self.links_existing,
            self.unknown_categories,
            self.failures
        )
    }
}

/// Applies the insert-if-absent, link-if-missing workflow to candidates,
/// one at a time and in the order given.
///
/// Statement failures skip the current record. Connection-level failures
/// stop the run and are returned to the caller.
pub struct Ingestor<'a> {
    store: &'a dyn ArticleStore,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn ArticleStore) -> Self {
        Self { store }
    }

    pub async fn ingest_all(&self, candidates: &[CandidateArticle]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for candidate in candidates {
            let outcome = self.ingest_one(candidate).await?;
            report.record(&outcome);
        }

        info!("Ingestion finished: {}", report);
        Ok(report)
    }

    pub async fn ingest_one(&self, candidate: &CandidateArticle) -> Result<IngestOutcome> {
        if candidate.natural_key.is_none() {
            warn!(
                "Article has no idx and will match any other article without one: {}",
                candidate.link
            );
        }

        let existing = match self.store.find_article_id(candidate.natural_key.as_deref()).await {
            Ok(existing) => existing,
            Err(err) => return skip_or_abort(candidate, IngestStage::Lookup, None, err),
        };

        let (article_id, is_new) = match existing {
            Some(id) => {
                debug!("Article {} already stored as {}", candidate.title, id);
                (id, false)
            }
            None => match self.store.insert_article(candidate).await {
                Ok(id) => (id, true),
                Err(err) => return skip_or_abort(candidate, IngestStage::Insert, None, err),
            },
        };

        let link = match self.store.link_category(article_id, &candidate.category).await {
            Ok(link) => link,
            Err(err) => {
                return skip_or_abort(candidate, IngestStage::Link, Some(article_id), err);
            }
        };

        match link {
            LinkOutcome::Linked => {
                debug!("Linked article {} to {}", article_id, candidate.category)
            }
            LinkOutcome::AlreadyLinked => {
                debug!("Article {} already in {}", article_id, candidate.category)
            }
            LinkOutcome::UnknownCategory => warn!(
                "Unknown category {} for article {}; no link written",
                candidate.category, article_id
            ),
        }

        if is_new {
            info!("Saved article {}: {}", article_id, candidate.title);
            Ok(IngestOutcome::Inserted { article_id, link })
        } else {
            info!("Duplicate article {}: {}", article_id, candidate.title);
            Ok(IngestOutcome::Duplicate { article_id, link })
        }
    }
}

fn skip_or_abort(
    candidate: &CandidateArticle,
    stage: IngestStage,
    article_id: Option<i64>,
    err: Error,
) -> Result<IngestOutcome> {
    if err.is_connection_error() {
        error!("Store connection lost during {} of {}: {}", stage, candidate.link, err);
        return Err(err);
    }

    error!("Skipping {} after {} failed: {}", candidate.link, stage, err);
    Ok(IngestOutcome::Failed {
        stage,
        article_id,
        reason: err.to_string(),
    })
}
