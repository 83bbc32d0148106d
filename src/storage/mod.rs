//! In-process storage for scraped payloads.

pub mod cache;

pub use cache::{CacheEntry, CacheManager};
