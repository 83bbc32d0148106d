// src/services/adapter.rs

//! The source adapter seam.
//!
//! An adapter knows how to fetch one catalog's pages and turn them into
//! [`ListingItem`]s plus a continuation cursor. Pagination, deadline checks
//! and early stopping live in the driver, not here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use url::Url;

use crate::error::Result;
use crate::models::{Config, GroupConfig, RawRecord, SourceConfig, SourceKind};
use crate::services::{DetailAdapter, ListingAdapter};
use crate::utils::http::PageFetcher;

/// Position within a source's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Fully built URL of the page
    pub url: Url,
    /// Result offset of the first item on the page
    pub offset: usize,
    /// Zero-based page number
    pub index: usize,
}

impl PageCursor {
    pub fn first(url: Url) -> Self {
        Self {
            url,
            offset: 0,
            index: 0,
        }
    }
}

/// One entry found on a listing page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingItem {
    /// All fields were on the listing page
    Record(RawRecord),
    /// Fields must be read from a separate detail page
    Detail { url: String, hint: String },
}

/// Items of one listing page and where to continue.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub items: Vec<ListingItem>,
    pub next: Option<PageCursor>,
}

/// A catalog the aggregator can scrape.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable id, used as the cache key
    fn id(&self) -> &str;

    /// Display name placed in every project
    fn name(&self) -> &str;

    /// Cursor for the first listing page of a scrape started on `today`.
    fn first_page(&self, today: NaiveDate) -> Result<PageCursor>;

    /// Download the page the cursor points to.
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<String>;

    /// Pull items and the next cursor out of a downloaded page.
    ///
    /// Items that lack required fields are skipped and logged here.
    fn extract(&self, body: &str, cursor: &PageCursor) -> ExtractedPage;

    /// Fetch and read a detail page.
    ///
    /// `Ok(None)` means the page was read but is incomplete.
    async fn resolve(&self, url: &str) -> Result<Option<RawRecord>> {
        log::debug!("{}: no detail lookup for {}", self.id(), url);
        Ok(None)
    }
}

/// Build the adapter for a configured source.
pub fn build_adapter(
    source: &SourceConfig,
    fetcher: Arc<dyn PageFetcher>,
) -> Result<Arc<dyn SourceAdapter>> {
    let adapter: Arc<dyn SourceAdapter> = match &source.kind {
        SourceKind::Listing(rules) => Arc::new(ListingAdapter::new(source, rules, fetcher)?),
        SourceKind::Detail(rules) => Arc::new(DetailAdapter::new(source, rules, fetcher)?),
    };
    Ok(adapter)
}

/// Configured adapters in priority order, plus named groups of them.
#[derive(Clone)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    groups: HashMap<String, Vec<String>>,
}

impl SourceRegistry {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, groups: &[GroupConfig]) -> Self {
        let groups = groups
            .iter()
            .map(|g| (g.id.clone(), g.sources.clone()))
            .collect();
        Self { adapters, groups }
    }

    /// Build every configured source over a shared fetcher.
    pub fn from_config(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let adapters = config
            .sources
            .iter()
            .map(|source| build_adapter(source, Arc::clone(&fetcher)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(adapters, &config.groups))
    }

    /// All adapters, in priority order.
    pub fn all(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Resolve a source or group id to its adapters.
    ///
    /// Group members keep the registry's priority order.
    pub fn select(&self, id: &str) -> Option<Vec<Arc<dyn SourceAdapter>>> {
        if let Some(members) = self.groups.get(id) {
            let selected: Vec<_> = self
                .adapters
                .iter()
                .filter(|a| members.iter().any(|m| m == a.id()))
                .cloned()
                .collect();
            return (!selected.is_empty()).then_some(selected);
        }
        self.adapters
            .iter()
            .find(|a| a.id() == id)
            .map(|a| vec![Arc::clone(a)])
    }

    /// Ids accepted by [`select`](Self::select).
    pub fn ids(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|a| a.id().to_string())
            .chain(self.groups.keys().cloned())
            .collect()
    }
}
