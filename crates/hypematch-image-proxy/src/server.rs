//! HTTP server for the image cache
//!
//! Provides /health, /images/{category} (serve or redirect),
//! /images/{category}/status, /images/{category}/cache and /admin/evict.

use crate::types::{ErrorResponse, EvictQuery, HealthResponse, ImageQuery};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use image_file_cache::{CacheOutcome, Category, FailureKind, ImageCacheManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Long-lived services shared by every request
pub struct ServerState {
    pub cache: ImageCacheManager,
    pub retention_days: u64,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: ImageCacheManager, retention_days: u64) -> Self {
        Self {
            cache,
            retention_days,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/images/{category}", get(get_image))
        .route("/images/{category}/status", get(get_status))
        .route("/images/{category}/cache", post(cache_image))
        .route("/admin/evict", post(evict))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Run the age-based eviction sweep every `every`, starting immediately
pub fn spawn_eviction_sweeper(state: SharedState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let cache = state.cache.clone();
            let days = state.retention_days;
            match tokio::task::spawn_blocking(move || cache.evict_older_than_days(days)).await {
                Ok(stats) => debug!(removed = stats.removed, "Scheduled eviction sweep done"),
                Err(e) => error!(error = %e, "Scheduled eviction sweep panicked"),
            }
        }
    })
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache_size_mb: state.cache.cache_size_mb(),
        cache: state.cache.stats(),
    })
}

/// Serve the cached file, or send the client to the remote URL while
/// caching it in the background
async fn get_image(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let category = match parse_category(&category) {
        Ok(category) => category,
        Err(response) => return response,
    };

    if let Some(path) = state.cache.lookup(&query.url, category) {
        match tokio::fs::read(&path).await {
            Ok(data) => return image_response(data),
            Err(e) => warn!(path = ?path, error = %e, "Failed to read cached image"),
        }
    }

    match state.cache.prefetch(&query.url, category) {
        CacheOutcome::Failed { reason } if reason.kind == FailureKind::InvalidUrl => {
            bad_request(reason.message)
        }
        _ => (
            StatusCode::TEMPORARY_REDIRECT,
            [
                (header::LOCATION, query.url.trim().to_string()),
                (X_CACHE, "MISS".to_string()),
            ],
        )
            .into_response(),
    }
}

async fn get_status(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let category = match parse_category(&category) {
        Ok(category) => category,
        Err(response) => return response,
    };

    if query.url.trim().is_empty() {
        return bad_request("Missing url parameter".to_string());
    }

    match state.cache.status(&query.url, category) {
        Some(outcome) => Json(outcome).into_response(),
        None => Json(serde_json::json!({ "state": "missing" })).into_response(),
    }
}

/// Cache the image and wait for the result
async fn cache_image(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let category = match parse_category(&category) {
        Ok(category) => category,
        Err(response) => return response,
    };

    let outcome = state.cache.ensure_cached(&query.url, category).await;
    let status = match &outcome {
        CacheOutcome::Cached { .. } => StatusCode::OK,
        CacheOutcome::Pending => StatusCode::ACCEPTED,
        CacheOutcome::Failed { reason } if reason.kind == FailureKind::InvalidUrl => {
            StatusCode::BAD_REQUEST
        }
        CacheOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    };

    (status, Json(outcome)).into_response()
}

async fn evict(State(state): State<SharedState>, Query(query): Query<EvictQuery>) -> Response {
    let days = query.max_age_days.unwrap_or(state.retention_days);
    let cache = state.cache.clone();

    match tokio::task::spawn_blocking(move || cache.evict_older_than_days(days)).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!(error = %e, "Eviction sweep panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Eviction failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn parse_category(raw: &str) -> Result<Category, Response> {
    raw.parse::<Category>()
        .map_err(|e| bad_request(e.to_string()))
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

fn image_response(data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "public, max-age=604800"),
            (X_CACHE, "HIT"),
        ],
        data,
    )
        .into_response()
}
