// src/pipeline/driver.rs

//! Pagination driver.
//!
//! Walks one adapter through its pages, normalizes every deadline, keeps the
//! open records and applies the early-stop rule: after `stale_limit`
//! consecutive expired records the scrape ends on the spot, mid-page
//! included. Catalogs sorted by deadline only get more expired further down,
//! so this bounds the number of upstream requests.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;

use crate::error::{AppError, Result, SkipReason};
use crate::models::{CrawlerConfig, Deadline, Project, RawRecord, normalize};
use crate::services::{ListingItem, PageCursor, SourceAdapter};

/// Why a scrape ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The adapter reported no further page
    Exhausted,
    /// Too many consecutive expired records
    StaleLimit,
    /// The page cap was reached
    PageLimit,
    /// A page could not be fetched, or the scrape ran out of time
    Failed,
}

/// Driver phases.
#[derive(Debug)]
enum Phase {
    Start,
    FetchingPage(PageCursor),
    Continue(PageCursor),
    Stopped(StopReason),
}

/// What happened to a page's items.
enum PageFlow {
    Continue,
    Stop(StopReason),
}

/// Mutable state of one scrape. Never shared between scrapes.
#[derive(Debug, Default)]
struct PaginationState {
    projects: Vec<Project>,
    consecutive_stale: usize,
    pages: usize,
    failure: Option<AppError>,
}

/// Result of scraping one source.
#[derive(Debug)]
pub struct SourceScrape {
    pub source_id: String,
    pub projects: Vec<Project>,
    pub pages: usize,
    pub stop: StopReason,
    /// Set when pagination ended on an error
    pub failure: Option<AppError>,
}

/// Drives a [`SourceAdapter`] through successive pages.
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    stale_limit: usize,
    max_pages: usize,
    page_timeout: Duration,
    scrape_timeout: Duration,
    request_delay: Duration,
}

impl PaginationDriver {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            stale_limit: config.stale_limit.max(1),
            max_pages: config.max_pages.max(1),
            page_timeout: config.page_timeout(),
            scrape_timeout: config.scrape_timeout(),
            request_delay: config.request_delay(),
        }
    }

    /// Scrape one source, judging deadlines against `today`.
    pub async fn run(&self, adapter: &dyn SourceAdapter, today: NaiveDate) -> SourceScrape {
        let scrape_deadline = Instant::now() + self.scrape_timeout;
        let mut state = PaginationState::default();
        let mut phase = Phase::Start;

        loop {
            phase = match phase {
                Phase::Start => match adapter.first_page(today) {
                    Ok(cursor) => Phase::FetchingPage(cursor),
                    Err(error) => {
                        state.failure = Some(error);
                        Phase::Stopped(StopReason::Failed)
                    }
                },
                Phase::FetchingPage(cursor) => {
                    self.fetch_and_consume(adapter, cursor, today, scrape_deadline, &mut state)
                        .await
                }
                Phase::Continue(cursor) => {
                    self.pause().await;
                    Phase::FetchingPage(cursor)
                }
                Phase::Stopped(stop) => {
                    log::info!(
                        "{}: stopped after {} page(s) with {} open projects ({:?})",
                        adapter.id(),
                        state.pages,
                        state.projects.len(),
                        stop
                    );
                    return SourceScrape {
                        source_id: adapter.id().to_string(),
                        projects: state.projects,
                        pages: state.pages,
                        stop,
                        failure: state.failure,
                    };
                }
            };
        }
    }

    async fn fetch_and_consume(
        &self,
        adapter: &dyn SourceAdapter,
        cursor: PageCursor,
        today: NaiveDate,
        scrape_deadline: Instant,
        state: &mut PaginationState,
    ) -> Phase {
        if state.pages >= self.max_pages {
            log::warn!(
                "{}: page limit of {} reached, stopping",
                adapter.id(),
                self.max_pages
            );
            return Phase::Stopped(StopReason::PageLimit);
        }

        let fetched = self
            .bounded(adapter.id(), "fetching a page", scrape_deadline, adapter.fetch_page(&cursor))
            .await;
        let body = match fetched {
            Ok(body) => body,
            Err(error) => {
                log::warn!("{}: pagination aborted: {}", adapter.id(), error);
                state.failure = Some(error);
                return Phase::Stopped(StopReason::Failed);
            }
        };
        state.pages += 1;

        let page = adapter.extract(&body, &cursor);
        log::debug!(
            "{}: page {} yielded {} items",
            adapter.id(),
            cursor.index + 1,
            page.items.len()
        );

        match self
            .consume(adapter, page.items, today, scrape_deadline, state)
            .await
        {
            PageFlow::Stop(stop) => Phase::Stopped(stop),
            PageFlow::Continue => match page.next {
                Some(next) => Phase::Continue(next),
                None => Phase::Stopped(StopReason::Exhausted),
            },
        }
    }

    /// Judge a page's items in document order.
    async fn consume(
        &self,
        adapter: &dyn SourceAdapter,
        items: Vec<ListingItem>,
        today: NaiveDate,
        scrape_deadline: Instant,
        state: &mut PaginationState,
    ) -> PageFlow {
        for item in items {
            let raw = match item {
                ListingItem::Record(raw) => raw,
                ListingItem::Detail { url, hint } => {
                    self.pause().await;
                    let resolved = self
                        .bounded(adapter.id(), "fetching a detail page", scrape_deadline, adapter.resolve(&url))
                        .await;
                    match resolved {
                        Ok(Some(raw)) => raw,
                        Ok(None) => continue,
                        Err(error) if Instant::now() >= scrape_deadline => {
                            log::warn!("{}: pagination aborted: {}", adapter.id(), error);
                            state.failure = Some(error);
                            return PageFlow::Stop(StopReason::Failed);
                        }
                        Err(error) => {
                            log::warn!("{}: skipping \"{}\": {}", adapter.id(), hint, error);
                            continue;
                        }
                    }
                }
            };

            match judge(raw, today) {
                Ok((raw, deadline)) => {
                    state.consecutive_stale = 0;
                    state
                        .projects
                        .push(Project::from_raw(raw, deadline, adapter.id(), adapter.name()));
                }
                Err((title, reason @ SkipReason::Expired(_))) => {
                    state.consecutive_stale += 1;
                    log::debug!("{}: skipping \"{}\": {}", adapter.id(), title, reason);
                    if state.consecutive_stale >= self.stale_limit {
                        log::info!(
                            "{}: {} consecutive expired deadlines, stopping early",
                            adapter.id(),
                            state.consecutive_stale
                        );
                        return PageFlow::Stop(StopReason::StaleLimit);
                    }
                }
                Err((title, reason)) => {
                    log::warn!("{}: skipping \"{}\": {}", adapter.id(), title, reason);
                }
            }
        }
        PageFlow::Continue
    }

    /// Run an I/O step within both the page budget and what is left of the
    /// scrape budget.
    async fn bounded<T>(
        &self,
        source_id: &str,
        what: &str,
        scrape_deadline: Instant,
        step: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let remaining = scrape_deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining.min(self.page_timeout), step).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(source_id, what)),
        }
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

/// Normalize a record's deadline and decide whether it is kept.
fn judge(
    raw: RawRecord,
    today: NaiveDate,
) -> std::result::Result<(RawRecord, Deadline), (String, SkipReason)> {
    let deadline = normalize(&raw.deadline);
    if deadline.is_past(today) {
        return Err((raw.title, SkipReason::Expired(raw.deadline)));
    }
    if !deadline.is_open_on(today) {
        return Err((raw.title, SkipReason::InvalidDeadline(raw.deadline)));
    }
    if raw.title.trim().is_empty() {
        return Err((
            raw.url,
            SkipReason::IncompleteRecord {
                missing: vec!["title"],
            },
        ));
    }
    Ok((raw, deadline))
}
