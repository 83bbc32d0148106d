//! Source adapters.
//!
//! - `ListingAdapter`: catalogs listing complete records
//! - `DetailAdapter`: catalogs linking to one page per project
//! - `SourceRegistry`: configured adapters and groups, in priority order

pub mod adapter;
mod detail;
mod listing;
mod selectors;

pub use adapter::{
    ExtractedPage, ListingItem, PageCursor, SourceAdapter, SourceRegistry, build_adapter,
};
pub use detail::DetailAdapter;
pub use listing::ListingAdapter;
pub use selectors::{DetailSelectors, ListingSelectors, parse_selector};
