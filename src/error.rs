// src/error.rs

//! Unified error handling for the aggregator.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A listing or detail page could not be fetched or read
    #[error("Page fetch failed for {source_id} ({url}): {message}")]
    PageFetch {
        source_id: String,
        url: String,
        message: String,
    },

    /// A page fetch or a whole scrape ran past its time budget
    #[error("Timed out while {what} for {source_id}")]
    Timeout { source_id: String, what: String },

    /// Neither a source nor a group with this id is configured
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Cache refresh failed and no payload could be served
    #[error("Refresh failed for '{key}': {message}")]
    Refresh { key: String, message: String },

    /// Every selected source failed
    #[error("All sources failed: {}", summarize(.0))]
    Aggregate(Vec<SourceFailure>),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a page fetch error for a source.
    pub fn page_fetch(
        source_id: impl Into<String>,
        url: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::PageFetch {
            source_id: source_id.into(),
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(source_id: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Timeout {
            source_id: source_id.into(),
            what: what.into(),
        }
    }

    /// Create a cache refresh error.
    pub fn refresh(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Refresh {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// A source that contributed an error to an aggregate scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub message: String,
    /// True when records gathered before the failure were still returned
    pub partial: bool,
}

fn summarize(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.source_id, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single record was left out of a result set.
///
/// These never propagate; they are logged where the record is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("deadline '{0}' is not recognizable")]
    InvalidDeadline(String),

    #[error("deadline '{0}' has already passed")]
    Expired(String),

    #[error("missing {}", .missing.join(", "))]
    IncompleteRecord { missing: Vec<&'static str> },
}
