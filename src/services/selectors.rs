//! Compiled selector sets.
//!
//! Source rules carry selectors as strings; adapters compile them once at
//! construction so malformed configuration fails early instead of per page.

use scraper::Selector;

use crate::error::{AppError, Result};
use crate::models::{DetailRules, ListingRules};

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn parse_optional(s: Option<&String>) -> Result<Option<Selector>> {
    s.map(|s| parse_selector(s)).transpose()
}

/// Selectors for a single-step listing page.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub item: Selector,
    pub title: Selector,
    pub link: Option<Selector>,
    pub dates: Option<Selector>,
    pub location: Option<Selector>,
    pub deadline: Selector,
    pub next_page: Option<Selector>,
}

impl ListingSelectors {
    pub fn compile(rules: &ListingRules) -> Result<Self> {
        Ok(Self {
            item: parse_selector(&rules.item_selector)?,
            title: parse_selector(&rules.title_selector)?,
            link: parse_optional(rules.link_selector.as_ref())?,
            dates: parse_optional(rules.dates_selector.as_ref())?,
            location: parse_optional(rules.location_selector.as_ref())?,
            deadline: parse_selector(&rules.deadline_selector)?,
            next_page: parse_optional(
                rules.pagination.as_ref().map(|p| &p.next_page_selector),
            )?,
        })
    }
}

/// Selectors for a two-step listing and its detail pages.
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    pub link: Selector,
    pub field: Selector,
    pub values: Vec<Selector>,
    pub title_fallback: Option<Selector>,
}

impl DetailSelectors {
    pub fn compile(rules: &DetailRules) -> Result<Self> {
        Ok(Self {
            link: parse_selector(&rules.link_selector)?,
            field: parse_selector(&rules.field_selector)?,
            values: rules
                .value_selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
            title_fallback: parse_optional(rules.title_fallback.as_ref())?,
        })
    }
}
