//! End-to-end checks of the HTTP surface against mocked catalogs.

use std::net::SocketAddr;
use std::sync::Arc;

use httpmock::prelude::*;
use mobility::models::Config;
use mobility::pipeline::ProjectService;
use mobility::server;
use serde_json::Value;

fn listing_item(title: &str, href: &str, deadline: &str) -> String {
    format!(
        r#"<div class="item">
             <h2><a href="{href}">{title}</a></h2>
             <span class="when">1 - 8 July</span>
             <span class="where">Sarajevo</span>
             <p class="deadline">Deadline: {deadline}</p>
           </div>"#
    )
}

fn config(upstream: &MockServer) -> Config {
    let base = upstream.base_url();
    let text = format!(
        r#"
        [crawler]
        request_delay_ms = 0

        [[sources]]
        id = "alpha"
        name = "Alpha Catalog"
        base_url = "{base}"
        listing_url = "{base}/alpha/list"
        kind = "listing"
        item_selector = "div.item"
        title_selector = "h2 a"
        dates_selector = "span.when"
        location_selector = "span.where"
        deadline_selector = "p.deadline"

        [[sources]]
        id = "beta"
        name = "Beta Catalog"
        base_url = "{base}"
        listing_url = "{base}/beta/list"
        kind = "detail"
        link_keywords = ["open-call"]

        [sources.labels]
        title = ["Name of the project:"]
        location = ["Places:"]
        deadline = ["Deadline for applying:"]
        dates = ["Dates of Project:"]

        [[groups]]
        id = "everything"
        sources = ["beta", "alpha"]
        "#
    );
    let config: Config = toml::from_str(&text).unwrap();
    config.validate().unwrap();
    config
}

async fn spawn_app(config: &Config) -> SocketAddr {
    let service = Arc::new(ProjectService::from_config(config).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(service)).await.unwrap();
    });
    addr
}

async fn get(addr: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn serves_open_projects_and_isolates_failed_source() {
    let upstream = MockServer::start_async().await;
    let page = format!(
        "<html><body>{}{}{}</body></html>",
        listing_item("Green Steps", "/alpha/green-steps", "12 May 2099"),
        listing_item("Old News", "/alpha/old-news", "3 March 2001"),
        listing_item("Open Minds", "https://elsewhere.org/open-minds", "01.02.2099"),
    );
    let alpha = upstream
        .mock_async(|when, then| {
            when.method(GET).path("/alpha/list");
            then.status(200)
                .header("content-type", "text/html")
                .body(page.clone());
        })
        .await;
    let beta = upstream
        .mock_async(|when, then| {
            when.method(GET).path("/beta/list");
            then.status(500);
        })
        .await;

    let addr = spawn_app(&config(&upstream)).await;

    let (status, body) = get(addr, "/projects").await;
    assert_eq!(status, 200);
    let projects = body.as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["title"], "Green Steps");
    assert_eq!(
        projects[0]["url"],
        format!("{}/alpha/green-steps", upstream.base_url())
    );
    assert_eq!(projects[0]["deadline"], "2099-05-12");
    assert_eq!(projects[0]["location"], "Sarajevo");
    assert_eq!(projects[0]["sourceId"], "alpha");
    assert_eq!(projects[0]["source"], "Alpha Catalog");
    assert_eq!(projects[1]["url"], "https://elsewhere.org/open-minds");

    alpha.assert_hits_async(1).await;
    beta.assert_hits_async(1).await;
}

#[tokio::test]
async fn caches_per_source_until_cleared() {
    let upstream = MockServer::start_async().await;
    let page = listing_item("Green Steps", "/alpha/green-steps", "12 May 2099");
    let alpha = upstream
        .mock_async(|when, then| {
            when.method(GET).path("/alpha/list");
            then.status(200).body(page.clone());
        })
        .await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/beta/list");
            then.status(503);
        })
        .await;

    let addr = spawn_app(&config(&upstream)).await;

    let (status, _) = get(addr, "/projects").await;
    assert_eq!(status, 200);
    let (status, body) = get(addr, "/api/projects/everything").await;
    assert_eq!(status, 200);
    assert_eq!(body.as_array().unwrap().len(), 1);
    alpha.assert_hits_async(1).await;

    let (status, body) = get(addr, "/cache/clear").await;
    assert_eq!(status, 200);
    assert_eq!(body["cleared"], 1);

    get(addr, "/projects/alpha").await;
    alpha.assert_hits_async(2).await;
}

#[tokio::test]
async fn reports_errors_as_json() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/beta/list");
            then.status(500);
        })
        .await;

    let addr = spawn_app(&config(&upstream)).await;

    let (status, body) = get(addr, "/projects/nowhere").await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("nowhere"));

    let (status, body) = get(addr, "/projects/beta").await;
    assert_eq!(status, 500);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn follows_detail_links_from_listing() {
    let upstream = MockServer::start_async().await;
    let listing = r#"
        <a href="/open-call-green-steps/">Green Steps</a>
        <a href="/about/">About us</a>"#;
    let detail = r#"
        <ul>
          <li>Name of the project: <strong>Green Steps</strong></li>
          <li>Places: <strong>Ohrid</strong></li>
          <li>Dates of Project: <strong>01.07.2099 - 08.07.2099</strong></li>
          <li>Deadline for applying: <strong>12.05.2099</strong></li>
        </ul>"#;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/beta/list");
            then.status(200).body(listing);
        })
        .await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/open-call-green-steps/");
            then.status(200).body(detail);
        })
        .await;

    let addr = spawn_app(&config(&upstream)).await;

    let (status, body) = get(addr, "/projects/beta").await;
    assert_eq!(status, 200);
    let projects = body.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["title"], "Green Steps");
    assert_eq!(projects[0]["location"], "Ohrid");
    assert_eq!(projects[0]["deadline"], "2099-05-12");
    assert_eq!(projects[0]["sourceId"], "beta");
}
