//! Response cache endpoints

use axum::{Json, extract::State, response::Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CacheStats;
use crate::errors::AppError;
use crate::web::AppState;
use crate::web::extractors::RequestContext;
use crate::web::responses::error_response;

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct CacheClearRequest {
    /// Only keys starting with this prefix; empty clears everything
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheClearResponse {
    pub cleared: u64,
}

/// Hit/miss counters and approximate size
#[utoipa::path(
    get,
    path = "/api/v1/cache/stats",
    tag = "cache",
    responses((status = 200, description = "Cache statistics", body = CacheStats))
)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

/// Bulk invalidation by key prefix
#[utoipa::path(
    post,
    path = "/api/v1/cache/clear",
    tag = "cache",
    request_body = CacheClearRequest,
    responses((status = 200, description = "Keys removed", body = CacheClearResponse))
)]
pub async fn cache_clear(
    State(state): State<AppState>,
    context: RequestContext,
    body: Option<Json<CacheClearRequest>>,
) -> Result<Json<CacheClearResponse>, Response> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let cleared = state
        .cache
        .clear(&request.prefix)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(CacheClearResponse { cleared }))
}
