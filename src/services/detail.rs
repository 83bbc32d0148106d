// src/services/detail.rs

//! Two-step listing adapter.
//!
//! The listing page only links to projects. Each linked page is fetched on
//! demand and read by label: entries such as
//! `<li>Deadline for applying: <strong>12.05.2025</strong></li>` are matched
//! on their label text and the emphasized value is taken.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result, SkipReason};
use crate::models::{DetailRules, RawRecord, SourceConfig};
use crate::services::adapter::{ExtractedPage, ListingItem, PageCursor, SourceAdapter};
use crate::services::selectors::DetailSelectors;
use crate::utils::http::PageFetcher;
use crate::utils::{clean_text, element_text, resolve_url};

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\s*[–-]\s*\d{1,2}[./-]\d{1,2}[./-]\d{2,4}")
        .expect("date range pattern is valid")
});

/// Adapter for catalogs whose listing page only links to detail pages.
pub struct DetailAdapter {
    id: String,
    name: String,
    base_url: Url,
    listing_url: Url,
    rules: DetailRules,
    selectors: DetailSelectors,
    fetcher: Arc<dyn PageFetcher>,
}

#[derive(Debug, Default)]
struct DetailFields {
    title: String,
    location: String,
    deadline: String,
    dates: String,
}

impl DetailFields {
    fn missing(&self) -> Vec<&'static str> {
        [
            ("name", &self.title),
            ("location", &self.location),
            ("deadline", &self.deadline),
            ("dates", &self.dates),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

impl DetailAdapter {
    pub fn new(
        source: &SourceConfig,
        rules: &DetailRules,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        Ok(Self {
            id: source.id.clone(),
            name: source.name.clone(),
            base_url: Url::parse(&source.base_url)?,
            listing_url: Url::parse(&source.listing_url)?,
            rules: rules.clone(),
            selectors: DetailSelectors::compile(rules)?,
            fetcher,
        })
    }

    fn accepts_link(&self, url: &str) -> bool {
        if self.rules.same_host {
            let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string));
            if host.as_deref() != self.base_url.host_str() {
                return false;
            }
        }
        self.rules.link_keywords.is_empty()
            || self.rules.link_keywords.iter().any(|k| url.contains(k.as_str()))
    }

    /// Text of the first value selector that matches inside an entry.
    ///
    /// Emphasized text that is itself one of the field's labels is skipped,
    /// so `<strong>Places:</strong> <b>Ohrid</b>` reads as "Ohrid".
    fn value_of(&self, entry: &ElementRef<'_>, labels: &[String]) -> String {
        self.selectors
            .values
            .iter()
            .map(|sel| {
                let joined: Vec<String> = entry
                    .select(sel)
                    .map(|e| element_text(&e))
                    .filter(|text| !text.is_empty() && !is_label(text, labels))
                    .collect();
                clean_text(&joined.join(" "))
            })
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Read a detail page into a record, or say what is missing.
    fn parse_detail(&self, body: &str, url: &str) -> std::result::Result<RawRecord, SkipReason> {
        let document = Html::parse_document(body);
        let labels = &self.rules.labels;
        let has_label = |text: &str, set: &[String]| set.iter().any(|l| text.contains(l.as_str()));

        let mut fields = DetailFields::default();
        for entry in document.select(&self.selectors.field) {
            let text = element_text(&entry);
            if fields.title.is_empty() && has_label(&text, &labels.title) {
                fields.title = self.value_of(&entry, &labels.title);
            } else if fields.location.is_empty() && has_label(&text, &labels.location) {
                fields.location = self.value_of(&entry, &labels.location);
            } else if fields.deadline.is_empty() && has_label(&text, &labels.deadline) {
                fields.deadline = self.value_of(&entry, &labels.deadline);
            } else if fields.dates.is_empty() && has_label(&text, &labels.dates) {
                fields.dates = self.value_of(&entry, &labels.dates);
            }
        }

        if fields.title.is_empty() {
            if let Some(sel) = &self.selectors.title_fallback {
                fields.title = document
                    .select(sel)
                    .next()
                    .map(|e| element_text(&e))
                    .unwrap_or_default();
            }
        }

        if fields.dates.is_empty() {
            let page_text = clean_text(&document.root_element().text().collect::<String>());
            if let Some(range) = DATE_RANGE.find(&page_text) {
                fields.dates = range.as_str().to_string();
            }
        }

        let missing = fields.missing();
        if !missing.is_empty() {
            return Err(SkipReason::IncompleteRecord { missing });
        }

        Ok(RawRecord {
            title: fields.title,
            dates: fields.dates,
            location: fields.location,
            deadline: fields.deadline,
            url: url.to_string(),
        })
    }
}

/// Whether `text` is one of `labels`, with or without its trailing colon.
fn is_label(text: &str, labels: &[String]) -> bool {
    labels
        .iter()
        .any(|label| text.contains(label.as_str()) || label.contains(text))
}

#[async_trait]
impl SourceAdapter for DetailAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn first_page(&self, _today: NaiveDate) -> Result<PageCursor> {
        Ok(PageCursor::first(self.listing_url.clone()))
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<String> {
        log::info!("{}: fetching listing {}", self.id, cursor.url);
        self.fetcher
            .fetch(&cursor.url)
            .await
            .map_err(|e| AppError::page_fetch(&self.id, cursor.url.as_str(), e))
    }

    fn extract(&self, body: &str, _cursor: &PageCursor) -> ExtractedPage {
        let document = Html::parse_document(body);

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for link in document.select(&self.selectors.link) {
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let url = resolve_url(&self.base_url, href);
            if self.accepts_link(&url) && seen.insert(url.clone()) {
                items.push(ListingItem::Detail {
                    url,
                    hint: element_text(&link),
                });
            }
        }

        log::info!("{}: found {} project links", self.id, items.len());
        ExtractedPage { items, next: None }
    }

    async fn resolve(&self, url: &str) -> Result<Option<RawRecord>> {
        let parsed = Url::parse(url)?;
        let body = self
            .fetcher
            .fetch(&parsed)
            .await
            .map_err(|e| AppError::page_fetch(&self.id, url, e))?;

        match self.parse_detail(&body, url) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                log::warn!("{}: skipping {}: {}", self.id, url, reason);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::{Config, SourceKind};

    #[derive(Default)]
    struct StaticPages(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for StaticPages {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.0
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| AppError::page_fetch("test", url.as_str(), "404"))
        }
    }

    fn bravo(pages: StaticPages) -> DetailAdapter {
        let config = Config::default();
        let source = config.sources.iter().find(|s| s.id == "bravo").unwrap();
        let SourceKind::Detail(rules) = &source.kind else {
            panic!("bravo is a detail source");
        };
        DetailAdapter::new(source, rules, Arc::new(pages)).unwrap()
    }

    const COMPLETE: &str = r#"
        <html><body><div class="elementor-widget-container"><ul>
          <li>Name of the project: <strong>Green Steps</strong></li>
          <li>Places: <b>Ohrid, North Macedonia</b></li>
          <li>Dates of Project: <strong>01.07.2025 – 08.07.2025</strong></li>
          <li>Deadline for applying: <strong>12.05.2025</strong></li>
        </ul></div></body></html>"#;

    #[test]
    fn extract_keeps_matching_links_once() {
        let adapter = bravo(StaticPages::default());
        let cursor = adapter.first_page(NaiveDate::MIN).unwrap();
        let body = r##"
            <a href="https://bravo-bih.com/open-call-youth-exchange-ohrid/">Youth Exchange in Ohrid</a>
            <a href="/open-call-training-course/">Training Course</a>
            <a href="https://bravo-bih.com/open-call-youth-exchange-ohrid/">again</a>
            <a href="https://bravo-bih.com/about-us/">About</a>
            <a href="https://facebook.com/youth-exchange">Share</a>
            <a href="#top">Top</a>"##;

        let page = adapter.extract(body, &cursor);
        assert!(page.next.is_none());
        assert_eq!(
            page.items,
            vec![
                ListingItem::Detail {
                    url: "https://bravo-bih.com/open-call-youth-exchange-ohrid/".into(),
                    hint: "Youth Exchange in Ohrid".into(),
                },
                ListingItem::Detail {
                    url: "https://bravo-bih.com/open-call-training-course/".into(),
                    hint: "Training Course".into(),
                },
            ]
        );
    }

    #[test]
    fn parses_labelled_fields() {
        let adapter = bravo(StaticPages::default());
        let record = adapter
            .parse_detail(COMPLETE, "https://bravo-bih.com/open-call/42")
            .unwrap();
        assert_eq!(record.title, "Green Steps");
        assert_eq!(record.location, "Ohrid, North Macedonia");
        assert_eq!(record.dates, "01.07.2025 – 08.07.2025");
        assert_eq!(record.deadline, "12.05.2025");
        assert_eq!(record.url, "https://bravo-bih.com/open-call/42");
    }

    #[test]
    fn falls_back_to_heading_and_body_date_range() {
        let adapter = bravo(StaticPages::default());
        let body = r#"
            <h1>Training Course: Media Literacy</h1>
            <p>The course runs 3.9.2025 - 10.9.2025 in Mostar.</p>
            <ul>
              <li>Places: <strong>Mostar</strong></li>
              <li>Deadline for applying: <strong>On a rolling basis</strong></li>
            </ul>"#;

        let record = adapter.parse_detail(body, "https://bravo-bih.com/x").unwrap();
        assert_eq!(record.title, "Training Course: Media Literacy");
        assert_eq!(record.dates, "3.9.2025 - 10.9.2025");
        assert_eq!(record.deadline, "On a rolling basis");
    }

    #[test]
    fn drops_pages_with_unresolved_fields() {
        let adapter = bravo(StaticPages::default());
        let body = r#"<ul><li>Name of the project: <strong>Half Done</strong></li>
                      <li>Deadline for applying: <strong>12.05.2025</strong></li></ul>"#;

        let reason = adapter.parse_detail(body, "https://bravo-bih.com/x").unwrap_err();
        assert_eq!(
            reason,
            SkipReason::IncompleteRecord {
                missing: vec!["location", "dates"]
            }
        );
    }

    #[test]
    fn skips_emphasized_labels() {
        let adapter = bravo(StaticPages::default());
        let body = r#"<ul>
              <li><strong>Name of the project:</strong> <strong>Open Minds</strong></li>
              <li><strong>Places:</strong> <b>Ohrid</b></li>
              <li><b>Dates of Project</b>: <strong>01.07.2025 - 08.07.2025</strong></li>
              <li><strong>Deadline for applying:</strong> <strong>12.05.2025</strong></li>
            </ul>"#;

        let record = adapter.parse_detail(body, "https://bravo-bih.com/x").unwrap();
        assert_eq!(record.title, "Open Minds");
        assert_eq!(record.location, "Ohrid");
        assert_eq!(record.dates, "01.07.2025 - 08.07.2025");
        assert_eq!(record.deadline, "12.05.2025");
    }

    #[test]
    fn label_matching_ignores_trailing_colon() {
        let labels = vec!["Places:".to_string()];
        assert!(is_label("Places:", &labels));
        assert!(is_label("Places", &labels));
        assert!(!is_label("Ohrid", &labels));
    }

    #[tokio::test]
    async fn resolve_fetches_and_reads_detail_page() {
        let url = "https://bravo-bih.com/open-call/42";
        let mut pages = StaticPages::default();
        pages.0.insert(url.to_string(), COMPLETE.to_string());
        let adapter = bravo(pages);

        let record = adapter.resolve(url).await.unwrap().unwrap();
        assert_eq!(record.title, "Green Steps");

        let incomplete = "https://bravo-bih.com/open-call/43";
        assert!(adapter.resolve(incomplete).await.is_err());
    }
}
