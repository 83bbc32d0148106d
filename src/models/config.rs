//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{GroupConfig, SourceConfig, SourceKind};
use crate::services::{DetailSelectors, ListingSelectors};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// HTTP client and scraping behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Catalogs, in output priority order
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,

    /// Named unions of sources
    #[serde(default = "defaults::groups")]
    pub groups: Vec<GroupConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.page_timeout_secs == 0 {
            return Err(AppError::validation("crawler.page_timeout_secs must be > 0"));
        }
        if self.crawler.scrape_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.scrape_timeout_secs must be > 0",
            ));
        }
        if self.crawler.stale_limit == 0 {
            return Err(AppError::validation("crawler.stale_limit must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate source id '{}'",
                    source.id
                )));
            }
            url::Url::parse(&source.base_url)?;
            url::Url::parse(&source.listing_url)?;
            match &source.kind {
                SourceKind::Listing(rules) => {
                    ListingSelectors::compile(rules)?;
                    if rules.pagination.as_ref().is_some_and(|p| p.page_size == 0) {
                        return Err(AppError::validation(format!(
                            "Source '{}' has a zero page size",
                            source.id
                        )));
                    }
                }
                SourceKind::Detail(rules) => {
                    DetailSelectors::compile(rules)?;
                }
            }
        }

        for group in &self.groups {
            if !ids.insert(group.id.as_str()) {
                return Err(AppError::validation(format!(
                    "Group id '{}' clashes with another source or group",
                    group.id
                )));
            }
            if group.sources.is_empty() {
                return Err(AppError::validation(format!(
                    "Group '{}' has no sources",
                    group.id
                )));
            }
            if let Some(missing) = group
                .sources
                .iter()
                .find(|id| !self.sources.iter().any(|s| &s.id == *id))
            {
                return Err(AppError::validation(format!(
                    "Group '{}' references unknown source '{}'",
                    group.id, missing
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            crawler: CrawlerConfig::default(),
            cache: CacheConfig::default(),
            sources: defaults::sources(),
            groups: defaults::groups(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Listening port
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Budget for a single page or detail fetch, in seconds
    #[serde(default = "defaults::page_timeout")]
    pub page_timeout_secs: u64,

    /// Budget for one source's whole pagination run, in seconds
    #[serde(default = "defaults::scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Delay between consecutive fetches of one source in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Consecutive expired records that end pagination
    #[serde(default = "defaults::stale_limit")]
    pub stale_limit: usize,

    /// Upper bound on listing pages per scrape
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            page_timeout_secs: defaults::page_timeout(),
            scrape_timeout_secs: defaults::scrape_timeout(),
            request_delay_ms: defaults::request_delay(),
            stale_limit: defaults::stale_limit(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached payload in seconds
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,

    /// Serve an expired payload when its refresh fails
    #[serde(default = "defaults::serve_stale")]
    pub serve_stale_on_error: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
            serve_stale_on_error: defaults::serve_stale(),
        }
    }
}

mod defaults {
    use crate::models::{
        DetailLabels, DetailRules, GroupConfig, ListingRules, Pagination, SourceConfig,
        SourceKind,
    };

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        3001
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; youth-mobility/0.1)".into()
    }
    pub fn page_timeout() -> u64 {
        30
    }
    pub fn scrape_timeout() -> u64 {
        300
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn stale_limit() -> usize {
        3
    }
    pub fn max_pages() -> usize {
        50
    }

    // Cache defaults
    pub fn ttl() -> u64 {
        3600
    }
    pub fn serve_stale() -> bool {
        true
    }

    const SALTO_BASE: &str = "https://www.salto-youth.net";
    const SALTO_BROWSE: &str =
        "https://www.salto-youth.net/tools/european-training-calendar/browse/";

    fn salto(id: &str, country: &str) -> SourceConfig {
        let query = [
            ("b_keyword", ""),
            ("b_funded_by_yia", "0"),
            ("b_country", ""),
            ("b_participating_countries", country),
            ("b_accessible_for_disabled", "0"),
            ("b_browse", "Search training offers"),
            ("b_order", "applicationDeadline"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        SourceConfig {
            id: id.to_string(),
            name: "SALTO Youth".to_string(),
            base_url: SALTO_BASE.to_string(),
            listing_url: SALTO_BROWSE.to_string(),
            kind: SourceKind::Listing(ListingRules {
                query,
                date_filters: vec![
                    "b_begin_date_after".to_string(),
                    "b_application_deadline_after".to_string(),
                ],
                item_selector: "div.tool-item-description".to_string(),
                title_selector: "h2.tool-item-name a".to_string(),
                link_selector: None,
                attr_name: "href".to_string(),
                dates_selector: Some("p.h5".to_string()),
                location_selector: Some("p.microcopy.mrgn-btm-17".to_string()),
                deadline_selector: "div.callout-module p.h3".to_string(),
                pagination: Some(Pagination {
                    offset_param: "b_offset".to_string(),
                    limit_param: Some("b_limit".to_string()),
                    page_size: 10,
                    next_page_selector: "a.entry.link.next-page".to_string(),
                }),
            }),
        }
    }

    fn bravo() -> SourceConfig {
        let strings =
            |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        SourceConfig {
            id: "bravo".to_string(),
            name: "BRAVO BiH".to_string(),
            base_url: "https://bravo-bih.com".to_string(),
            listing_url: "https://bravo-bih.com/bravo-projects/key-action-1/".to_string(),
            kind: SourceKind::Detail(DetailRules {
                link_selector: "a".to_string(),
                link_keywords: strings(&["open-call", "exchange", "youth", "mobility", "training"]),
                same_host: true,
                field_selector: "ul li".to_string(),
                value_selectors: strings(&["strong", "b"]),
                labels: DetailLabels {
                    title: strings(&["Name of the project:"]),
                    location: strings(&["Places:"]),
                    deadline: strings(&["Deadline for applying:"]),
                    dates: strings(&[
                        "Dates of Project:",
                        "Date of project:",
                        "Dates of the project:",
                    ]),
                },
                title_fallback: Some("h1, h2".to_string()),
            }),
        }
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![
            bravo(),
            salto("salto-bosnia", "country-53"),
            salto("salto-montenegro", "country-238"),
        ]
    }

    pub fn groups() -> Vec<GroupConfig> {
        vec![
            GroupConfig {
                id: "bosnia".to_string(),
                sources: vec!["bravo".to_string(), "salto-bosnia".to_string()],
            },
            GroupConfig {
                id: "montenegro".to_string(),
                sources: vec!["salto-montenegro".to_string()],
            },
        ]
    }
}
