//! Scraping pipeline.
//!
//! - `driver`: walks one source through its pages with early stopping
//! - `aggregate`: runs several sources concurrently and merges them
//! - `service`: puts the cache in front of the aggregator

pub mod aggregate;
pub mod driver;
pub mod service;

pub use aggregate::{AggregateOutcome, Aggregator, SourceSnapshot};
pub use driver::{PaginationDriver, SourceScrape, StopReason};
pub use service::ProjectService;
