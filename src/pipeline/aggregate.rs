// src/pipeline/aggregate.rs

//! Concurrent scraping of several sources.
//!
//! Every selected source runs at once, but results are merged in the order
//! the sources were given (their configured priority), never in completion
//! order. A failing source adds an entry to the failure list and nothing
//! else.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;

use crate::error::{AppError, Result, SourceFailure};
use crate::models::{CrawlerConfig, Project};
use crate::pipeline::driver::{PaginationDriver, SourceScrape};
use crate::services::SourceAdapter;

/// What one source contributed to the last scrape of it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSnapshot {
    pub projects: Vec<Project>,
    /// Set when pagination failed after some records were gathered
    pub failure: Option<String>,
}

impl SourceSnapshot {
    /// Keep what a scrape gathered.
    ///
    /// A scrape that failed before gathering anything is a failure of the
    /// whole source.
    pub fn from_scrape(scrape: SourceScrape) -> Result<Self> {
        match scrape.failure {
            Some(error) if scrape.projects.is_empty() => Err(error),
            failure => {
                if let Some(error) = &failure {
                    log::warn!(
                        "{}: keeping {} projects gathered before failure: {}",
                        scrape.source_id,
                        scrape.projects.len(),
                        error
                    );
                }
                Ok(Self {
                    projects: scrape.projects,
                    failure: failure.map(|e| e.to_string()),
                })
            }
        }
    }
}

/// Merged output of several sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateOutcome {
    pub projects: Vec<Project>,
    pub failures: Vec<SourceFailure>,
    #[serde(skip)]
    sources: usize,
}

impl AggregateOutcome {
    /// Merge per-source results, given in priority order.
    ///
    /// A record whose URL was already contributed by an earlier source is
    /// dropped.
    pub fn merge(results: Vec<(String, Result<Arc<SourceSnapshot>>)>) -> Self {
        let mut outcome = Self {
            sources: results.len(),
            ..Self::default()
        };
        let mut seen = HashSet::new();

        for (source_id, result) in results {
            match result {
                Ok(snapshot) => {
                    if let Some(message) = &snapshot.failure {
                        outcome.failures.push(SourceFailure {
                            source_id: source_id.clone(),
                            message: message.clone(),
                            partial: true,
                        });
                    }
                    for project in &snapshot.projects {
                        if seen.insert(project.url.clone()) {
                            outcome.projects.push(project.clone());
                        } else {
                            log::debug!("{source_id}: dropping duplicate {}", project.url);
                        }
                    }
                }
                Err(error) => {
                    log::warn!("{source_id}: source failed: {error}");
                    outcome.failures.push(SourceFailure {
                        source_id,
                        message: error.to_string(),
                        partial: false,
                    });
                }
            }
        }
        outcome
    }

    /// True when sources were selected and none of them produced anything.
    pub fn all_failed(&self) -> bool {
        self.sources > 0 && self.failures.iter().filter(|f| !f.partial).count() == self.sources
    }

    /// Turn a complete wipe-out into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.all_failed() {
            return Err(AppError::Aggregate(self.failures));
        }
        Ok(self)
    }
}

/// Run `per_source` for every source concurrently and merge in input order.
pub async fn gather<F, Fut>(sources: &[Arc<dyn SourceAdapter>], per_source: F) -> AggregateOutcome
where
    F: Fn(Arc<dyn SourceAdapter>) -> Fut,
    Fut: Future<Output = Result<Arc<SourceSnapshot>>>,
{
    let runs = sources.iter().map(|adapter| {
        let source_id = adapter.id().to_string();
        let run = per_source(Arc::clone(adapter));
        async move { (source_id, run.await) }
    });
    let outcome = AggregateOutcome::merge(join_all(runs).await);

    log::info!(
        "aggregated {} projects from {} source(s), {} failure(s)",
        outcome.projects.len(),
        sources.len(),
        outcome.failures.len()
    );
    outcome
}

/// Scrapes sources without any caching.
#[derive(Debug, Clone)]
pub struct Aggregator {
    driver: PaginationDriver,
}

impl Aggregator {
    pub fn new(driver: PaginationDriver) -> Self {
        Self { driver }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(PaginationDriver::new(config))
    }

    /// Scrape one source to a snapshot.
    pub async fn scrape_source(
        &self,
        adapter: &dyn SourceAdapter,
        today: NaiveDate,
    ) -> Result<SourceSnapshot> {
        SourceSnapshot::from_scrape(self.driver.run(adapter, today).await)
    }

    /// Scrape every source concurrently.
    pub async fn scrape_all(
        &self,
        sources: &[Arc<dyn SourceAdapter>],
        today: NaiveDate,
    ) -> AggregateOutcome {
        gather(sources, |adapter| async move {
            self.scrape_source(adapter.as_ref(), today)
                .await
                .map(Arc::new)
        })
        .await
    }
}
