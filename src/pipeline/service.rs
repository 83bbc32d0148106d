// src/pipeline/service.rs

//! Cached project lookups for the HTTP layer.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::aggregate::{AggregateOutcome, Aggregator, SourceSnapshot, gather};
use crate::services::{SourceAdapter, SourceRegistry};
use crate::storage::CacheManager;
use crate::utils::http::HttpFetcher;

/// Serves aggregated projects, scraping each source at most once per TTL.
///
/// Cache keys are source ids, so a source shared by several groups is
/// scraped once for all of them.
#[derive(Clone)]
pub struct ProjectService {
    registry: SourceRegistry,
    aggregator: Aggregator,
    cache: CacheManager<SourceSnapshot>,
}

impl ProjectService {
    pub fn new(
        registry: SourceRegistry,
        aggregator: Aggregator,
        cache: CacheManager<SourceSnapshot>,
    ) -> Self {
        Self {
            registry,
            aggregator,
            cache,
        }
    }

    /// Build the service with a live HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config.crawler)?);
        Ok(Self::new(
            SourceRegistry::from_config(config, fetcher)?,
            Aggregator::from_config(&config.crawler),
            CacheManager::from_config(&config.cache),
        ))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Projects from every configured source.
    pub async fn all(&self) -> AggregateOutcome {
        self.collect(self.registry.all()).await
    }

    /// Projects from one source or group.
    ///
    /// Fails when the id is unknown or when every selected source failed.
    pub async fn select(&self, id: &str) -> Result<AggregateOutcome> {
        let sources = self
            .registry
            .select(id)
            .ok_or_else(|| AppError::UnknownSource(id.to_string()))?;
        self.collect(&sources).await.into_result()
    }

    /// Forget every cached source. Returns the number of entries dropped.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear_all()
    }

    async fn collect(&self, sources: &[Arc<dyn SourceAdapter>]) -> AggregateOutcome {
        let today = today();
        gather(sources, |adapter| async move {
            let key = adapter.id().to_string();
            let aggregator = self.aggregator.clone();
            self.cache
                .get_or_refresh(&key, move || async move {
                    aggregator.scrape_source(adapter.as_ref(), today).await
                })
                .await
        })
        .await
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
