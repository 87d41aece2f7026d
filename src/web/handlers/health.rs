//! Health check endpoint

use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::CacheStats;
use crate::web::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub cache: CacheStats,
    pub providers_registered: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseHealth {
    pub status: String,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness plus a database connectivity probe
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_health = state.database.health_check().await;
    let cache_stats = state.cache.stats().await;

    let status = if db_health.is_healthy {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            status: if db_health.is_healthy {
                "connected".to_string()
            } else {
                "error".to_string()
            },
            response_time_ms: db_health.response_time.as_millis() as u64,
            error: db_health.error,
        },
        cache: cache_stats,
        providers_registered: state.registry.len(),
    })
}
