// src/models/mod.rs

//! Domain models for the aggregator.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod deadline;
mod project;
mod source;

// Re-export all public types
pub use config::{CacheConfig, Config, CrawlerConfig, ServerConfig};
pub use deadline::{Deadline, normalize};
pub use project::{Project, RawRecord};
pub use source::{
    DetailLabels, DetailRules, GroupConfig, ListingRules, Pagination, SourceConfig, SourceKind,
};
