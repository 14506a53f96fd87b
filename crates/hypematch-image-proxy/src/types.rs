//! Request and response types for the image proxy

use image_file_cache::CacheStats;
use serde::{Deserialize, Serialize};

/// `?url=` query shared by the image endpoints
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct EvictQuery {
    pub max_age_days: Option<u64>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache_size_mb: f64,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
