//! Project data structures.

use serde::{Deserialize, Serialize};

use crate::models::Deadline;

/// Fields pulled out of a catalog page before deadline normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub title: String,
    pub dates: String,
    pub location: String,
    pub deadline: String,
    /// Absolute URL of the listing
    pub url: String,
}

/// An open call served to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project title
    pub title: String,

    /// Human-readable date range, as published
    pub dates: String,

    /// Venue or country, as published
    pub location: String,

    /// Deadline text, as published
    pub deadline_raw: String,

    /// Normalized deadline
    pub deadline: Deadline,

    /// Absolute link to the listing
    pub url: String,

    /// Id of the source that produced this record
    pub source_id: String,

    /// Display name of the catalog
    pub source: String,
}

impl Project {
    /// Build a project from an extracted record.
    pub fn from_raw(
        raw: RawRecord,
        deadline: Deadline,
        source_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: raw.title,
            dates: raw.dates,
            location: raw.location,
            deadline_raw: raw.deadline,
            deadline,
            url: raw.url,
            source_id: source_id.into(),
            source: source.into(),
        }
    }
}
