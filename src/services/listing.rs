// src/services/listing.rs

//! Single-step listing adapter.
//!
//! Reads every field of a project straight from the listing page using the
//! source's configured selectors, and follows offset pagination while the
//! "next page" element is present.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result, SkipReason};
use crate::models::{ListingRules, Pagination, RawRecord, SourceConfig};
use crate::services::adapter::{ExtractedPage, ListingItem, PageCursor, SourceAdapter};
use crate::services::selectors::ListingSelectors;
use crate::utils::http::PageFetcher;
use crate::utils::{element_text, resolve_url};

/// Adapter for catalogs that publish complete records on the listing page.
pub struct ListingAdapter {
    id: String,
    name: String,
    base_url: Url,
    listing_url: Url,
    rules: ListingRules,
    selectors: ListingSelectors,
    fetcher: Arc<dyn PageFetcher>,
}

impl ListingAdapter {
    pub fn new(
        source: &SourceConfig,
        rules: &ListingRules,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        Ok(Self {
            id: source.id.clone(),
            name: source.name.clone(),
            base_url: Url::parse(&source.base_url)?,
            listing_url: Url::parse(&source.listing_url)?,
            rules: rules.clone(),
            selectors: ListingSelectors::compile(rules)?,
            fetcher,
        })
    }

    /// Listing URL with fixed parameters, today's date filters and the
    /// pagination window for `offset`.
    fn page_url(&self, today: NaiveDate, offset: usize) -> Url {
        let mut url = self.listing_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.rules.query {
                pairs.append_pair(key, value);
            }
            for prefix in &self.rules.date_filters {
                pairs.append_pair(&format!("{prefix}_day"), &today.day().to_string());
                pairs.append_pair(&format!("{prefix}_month"), &today.month().to_string());
                pairs.append_pair(&format!("{prefix}_year"), &today.year().to_string());
            }
            if let Some(pagination) = &self.rules.pagination {
                pairs.append_pair(&pagination.offset_param, &offset.to_string());
                if let Some(limit) = &pagination.limit_param {
                    pairs.append_pair(limit, &pagination.page_size.to_string());
                }
            }
        }
        url
    }

    fn next_cursor(&self, cursor: &PageCursor, pagination: &Pagination) -> PageCursor {
        let offset = cursor.offset + pagination.page_size;
        PageCursor {
            url: with_param(&cursor.url, &pagination.offset_param, &offset.to_string()),
            offset,
            index: cursor.index + 1,
        }
    }

    fn parse_item(&self, item: &ElementRef<'_>) -> std::result::Result<RawRecord, SkipReason> {
        let title_elem = item.select(&self.selectors.title).next();
        let title = title_elem.as_ref().map(element_text).unwrap_or_default();

        let link_elem = match &self.selectors.link {
            Some(sel) => item.select(sel).next(),
            None => title_elem,
        };
        let href = link_elem
            .and_then(|e| e.value().attr(&self.rules.attr_name))
            .map(str::trim)
            .unwrap_or("");

        let mut missing = Vec::new();
        if title.is_empty() {
            missing.push("title");
        }
        if href.is_empty() {
            missing.push("link");
        }
        if !missing.is_empty() {
            return Err(SkipReason::IncompleteRecord { missing });
        }

        Ok(RawRecord {
            title,
            dates: first_text(item, self.selectors.dates.as_ref()),
            location: first_text(item, self.selectors.location.as_ref()),
            deadline: first_text(item, Some(&self.selectors.deadline)),
            url: resolve_url(&self.base_url, href),
        })
    }
}

#[async_trait]
impl SourceAdapter for ListingAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn first_page(&self, today: NaiveDate) -> Result<PageCursor> {
        Ok(PageCursor::first(self.page_url(today, 0)))
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<String> {
        log::info!("{}: fetching page {} ({})", self.id, cursor.index + 1, cursor.url);
        self.fetcher
            .fetch(&cursor.url)
            .await
            .map_err(|e| AppError::page_fetch(&self.id, cursor.url.as_str(), e))
    }

    fn extract(&self, body: &str, cursor: &PageCursor) -> ExtractedPage {
        let document = Html::parse_document(body);

        let mut items = Vec::new();
        for (position, item) in document.select(&self.selectors.item).enumerate() {
            match self.parse_item(&item) {
                Ok(record) => items.push(ListingItem::Record(record)),
                Err(reason) => log::warn!(
                    "{}: skipping item {} on page {}: {}",
                    self.id,
                    position + 1,
                    cursor.index + 1,
                    reason
                ),
            }
        }

        let has_next = self
            .selectors
            .next_page
            .as_ref()
            .is_some_and(|sel| document.select(sel).next().is_some());
        let next = match &self.rules.pagination {
            Some(pagination) if has_next => Some(self.next_cursor(cursor, pagination)),
            _ => None,
        };

        ExtractedPage { items, next }
    }
}

fn first_text(item: &ElementRef<'_>, selector: Option<&Selector>) -> String {
    selector
        .and_then(|sel| item.select(sel).next())
        .map(|e| element_text(&e))
        .unwrap_or_default()
}

/// Copy of `url` with `name` set to `value`, other parameters untouched.
fn with_param(url: &Url, name: &str, value: &str) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == name { value.to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    let mut next = url.clone();
    next.query_pairs_mut().clear().extend_pairs(pairs);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::models::SourceKind;

    struct NoFetch;

    #[async_trait]
    impl PageFetcher for NoFetch {
        async fn fetch(&self, url: &Url) -> Result<String> {
            Err(AppError::page_fetch("test", url.as_str(), "offline"))
        }
    }

    fn salto() -> ListingAdapter {
        let config = Config::default();
        let source = config
            .sources
            .iter()
            .find(|s| s.id == "salto-bosnia")
            .unwrap();
        let SourceKind::Listing(rules) = &source.kind else {
            panic!("salto is a listing source");
        };
        ListingAdapter::new(source, rules, Arc::new(NoFetch)).unwrap()
    }

    fn item(title: &str, href: &str, deadline: &str) -> String {
        format!(
            r#"<div class="tool-item-description">
                 <h2 class="tool-item-name"><a href="{href}">{title}</a></h2>
                 <p class="h5">1 - 8 July 2025</p>
                 <p class="microcopy mrgn-btm-17">Sarajevo,
                    Bosnia and Herzegovina</p>
                 <div class="callout-module"><p class="h3">Application deadline: {deadline}</p></div>
               </div>"#
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    #[test]
    fn first_page_carries_filters_and_window() {
        let cursor = salto().first_page(today()).unwrap();
        let query: Vec<(String, String)> = cursor.url.query_pairs().into_owned().collect();
        let get = |k: &str| query.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(get("b_participating_countries"), Some("country-53"));
        assert_eq!(get("b_begin_date_after_day"), Some("9"));
        assert_eq!(get("b_application_deadline_after_month"), Some("3"));
        assert_eq!(get("b_application_deadline_after_year"), Some("2025"));
        assert_eq!(get("b_offset"), Some("0"));
        assert_eq!(get("b_limit"), Some("10"));
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn extracts_items_in_document_order() {
        let adapter = salto();
        let cursor = adapter.first_page(today()).unwrap();
        let body = format!(
            "<html><body>{}{}</body></html>",
            item("First", "/tools/european-training-calendar/training/first.123/", "12 May 2025"),
            item("Second", "https://elsewhere.org/second", "rolling"),
        );

        let page = adapter.extract(&body, &cursor);
        assert!(page.next.is_none());
        assert_eq!(page.items.len(), 2);

        let ListingItem::Record(first) = &page.items[0] else {
            panic!("expected a record");
        };
        assert_eq!(first.title, "First");
        assert_eq!(
            first.url,
            "https://www.salto-youth.net/tools/european-training-calendar/training/first.123/"
        );
        assert_eq!(first.dates, "1 - 8 July 2025");
        assert_eq!(first.location, "Sarajevo, Bosnia and Herzegovina");
        assert_eq!(first.deadline, "Application deadline: 12 May 2025");

        let ListingItem::Record(second) = &page.items[1] else {
            panic!("expected a record");
        };
        assert_eq!(second.url, "https://elsewhere.org/second");
    }

    #[test]
    fn skips_items_without_title_or_link() {
        let adapter = salto();
        let cursor = adapter.first_page(today()).unwrap();
        let body = format!(
            "{}{}{}",
            item("", "/a", "12 May 2025"),
            r#"<div class="tool-item-description"><h2 class="tool-item-name"><a>No link</a></h2></div>"#,
            item("Kept", "/b", "12 May 2025"),
        );

        let page = adapter.extract(&body, &cursor);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn next_page_advances_offset() {
        let adapter = salto();
        let cursor = adapter.first_page(today()).unwrap();
        let body = format!(
            r#"{}<a class="entry link next-page" href="?b_offset=10">Next</a>"#,
            item("Only", "/x", "12 May 2025")
        );

        let next = adapter.extract(&body, &cursor).next.unwrap();
        assert_eq!(next.offset, 10);
        assert_eq!(next.index, 1);
        assert!(next.url.as_str().contains("b_offset=10"));
        assert!(next.url.as_str().contains("b_participating_countries=country-53"));

        let after = adapter.extract(&body, &next).next.unwrap();
        assert_eq!(after.offset, 20);
    }

    #[test]
    fn with_param_replaces_only_named_parameter() {
        let url = Url::parse("https://example.org/browse/?a=1&b_offset=0&c=x+y").unwrap();
        let next = with_param(&url, "b_offset", "10");
        assert_eq!(next.as_str(), "https://example.org/browse/?a=1&b_offset=10&c=x+y");
    }
}
