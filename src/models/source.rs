// src/models/source.rs

//! Catalog source definitions.
//!
//! Each catalog is described by data (URLs, query parameters and CSS
//! selectors) rather than code; the adapters in `services` interpret it.

use serde::{Deserialize, Serialize};

/// One external catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier, also the cache key (e.g. "salto-bosnia")
    pub id: String,

    /// Display name placed in every project (e.g. "SALTO Youth")
    pub name: String,

    /// Site root used to absolutize relative links
    pub base_url: String,

    /// First listing page, without per-scrape query parameters
    pub listing_url: String,

    /// How listings are extracted
    #[serde(flatten)]
    pub kind: SourceKind,
}

/// Extraction strategy for a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Every field is read from the listing page itself
    Listing(ListingRules),
    /// The listing page only yields links; fields live on detail pages
    Detail(DetailRules),
}

/// Selectors and query parameters for a single-step listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRules {
    /// Fixed query parameters appended to the listing URL
    #[serde(default)]
    pub query: Vec<(String, String)>,

    /// Parameter prefixes that receive today's `_day`, `_month` and `_year`
    #[serde(default)]
    pub date_filters: Vec<String>,

    /// Selector for each result item
    pub item_selector: String,

    /// Selector for the title element within an item
    pub title_selector: String,

    /// Selector for the link element (defaults to the title element)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,

    /// HTML attribute holding the link
    #[serde(default = "default_attr_name")]
    pub attr_name: String,

    /// Selector for the date range element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates_selector: Option<String>,

    /// Selector for the location element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_selector: Option<String>,

    /// Selector for the element carrying the deadline text
    pub deadline_selector: String,

    /// Offset-based pagination; absent means a single page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Offset pagination driven by a "next page" link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Query parameter carrying the result offset
    pub offset_param: String,

    /// Query parameter carrying the page size, if the site takes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_param: Option<String>,

    /// Results per page
    pub page_size: usize,

    /// Selector whose presence means another page exists
    pub next_page_selector: String,
}

/// Link discovery and label lookup for a two-step catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailRules {
    /// Selector for candidate links on the listing page
    #[serde(default = "default_link_selector")]
    pub link_selector: String,

    /// A link qualifies if its href contains any of these
    #[serde(default)]
    pub link_keywords: Vec<String>,

    /// Only follow links on the catalog's own host
    #[serde(default = "default_true")]
    pub same_host: bool,

    /// Selector for the labelled entries on a detail page
    #[serde(default = "default_field_selector")]
    pub field_selector: String,

    /// Selectors for the emphasized value inside an entry, tried in order
    #[serde(default = "default_value_selectors")]
    pub value_selectors: Vec<String>,

    /// Label prefixes per field
    pub labels: DetailLabels,

    /// Where to look for a title when no label matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_fallback: Option<String>,
}

/// Label texts that identify each field on a detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailLabels {
    pub title: Vec<String>,
    pub location: Vec<String>,
    pub deadline: Vec<String>,
    pub dates: Vec<String>,
}

/// A named union of sources served under one id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    /// Member source ids. Output follows the `[[sources]]` priority order,
    /// not the order listed here.
    pub sources: Vec<String>,
}

fn default_attr_name() -> String {
    "href".to_string()
}

fn default_link_selector() -> String {
    "a".to_string()
}

fn default_field_selector() -> String {
    "ul li".to_string()
}

fn default_value_selectors() -> Vec<String> {
    vec!["strong".to_string(), "b".to_string()]
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_source_from_toml() {
        let source: SourceConfig = toml::from_str(
            r#"
            id = "salto"
            name = "SALTO Youth"
            base_url = "https://www.salto-youth.net"
            listing_url = "https://www.salto-youth.net/browse/"
            kind = "listing"
            query = [["b_order", "applicationDeadline"]]
            item_selector = "div.item"
            title_selector = "h2 a"
            deadline_selector = "p.deadline"

            [pagination]
            offset_param = "b_offset"
            page_size = 10
            next_page_selector = "a.next"
            "#,
        )
        .unwrap();

        let SourceKind::Listing(rules) = source.kind else {
            panic!("expected listing kind");
        };
        assert_eq!(rules.attr_name, "href");
        assert_eq!(rules.query[0].1, "applicationDeadline");
        assert_eq!(rules.pagination.unwrap().page_size, 10);
    }

    #[test]
    fn parses_detail_source_with_defaults() {
        let source: SourceConfig = toml::from_str(
            r#"
            id = "bravo"
            name = "BRAVO BiH"
            base_url = "https://bravo-bih.com"
            listing_url = "https://bravo-bih.com/key-action-1/"
            kind = "detail"
            link_keywords = ["open-call"]

            [labels]
            title = ["Name of the project:"]
            location = ["Places:"]
            deadline = ["Deadline for applying:"]
            dates = ["Dates of Project:"]
            "#,
        )
        .unwrap();

        let SourceKind::Detail(rules) = source.kind else {
            panic!("expected detail kind");
        };
        assert!(rules.same_host);
        assert_eq!(rules.field_selector, "ul li");
        assert_eq!(rules.value_selectors, vec!["strong", "b"]);
    }
}
