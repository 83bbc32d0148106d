// src/server.rs

//! HTTP surface.
//!
//! Routes are mounted both at the root and under `/api`:
//!
//! - `GET /projects`: open projects from every source
//! - `GET /projects/{id}`: open projects from one source or group
//! - `GET /cache/clear`: drop every cached source

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::{AppError, Result};
use crate::models::Project;
use crate::pipeline::ProjectService;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnknownSource(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router over a shared service.
pub fn router(service: Arc<ProjectService>) -> Router {
    let routes = Router::new()
        .route("/projects", get(all_projects))
        .route("/projects/:source_id", get(source_projects))
        .route("/cache/clear", get(clear_cache));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Serve until Ctrl-C.
pub async fn serve(service: Arc<ProjectService>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutdown requested"),
        Err(e) => log::error!("cannot listen for shutdown signal: {e}"),
    }
}

async fn all_projects(State(service): State<Arc<ProjectService>>) -> Json<Vec<Project>> {
    let outcome = service.all().await;
    for failure in &outcome.failures {
        log::warn!("{}: {}", failure.source_id, failure.message);
    }
    Json(outcome.projects)
}

async fn source_projects(
    State(service): State<Arc<ProjectService>>,
    Path(source_id): Path<String>,
) -> Result<Json<Vec<Project>>> {
    let outcome = service.select(&source_id).await?;
    for failure in &outcome.failures {
        log::warn!("{}: {}", failure.source_id, failure.message);
    }
    Ok(Json(outcome.projects))
}

async fn clear_cache(State(service): State<Arc<ProjectService>>) -> Json<serde_json::Value> {
    let cleared = service.clear_cache();
    Json(json!({ "status": "cache cleared", "cleared": cleared }))
}
