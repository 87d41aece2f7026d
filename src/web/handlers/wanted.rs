//! Wanted-item endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::database::repositories::wanted::WantedListFilter;
use crate::errors::AppError;
use crate::models::{MediaKind, WantedItem, WantedStats, WantedStatus};
use crate::wanted::ProcessOutcome;
use crate::web::AppState;
use crate::web::extractors::{PaginationParams, RequestContext};
use crate::web::responses::{PaginatedResponse, error_response};

#[derive(Debug, Deserialize, IntoParams)]
pub struct WantedListParams {
    pub status: Option<WantedStatus>,
    pub kind: Option<MediaKind>,
    pub series_id: Option<i64>,
    /// Substring match on the media file path
    pub path: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub status: String,
}

/// Paginated wanted-item listing with filters
#[utoipa::path(
    get,
    path = "/api/v1/wanted",
    tag = "wanted",
    params(WantedListParams),
    responses((status = 200, description = "Wanted items", body = PaginatedResponse<WantedItem>))
)]
pub async fn list_wanted(
    State(state): State<AppState>,
    context: RequestContext,
    Query(params): Query<WantedListParams>,
) -> Result<Json<PaginatedResponse<WantedItem>>, Response> {
    let (page, per_page) = PaginationParams {
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(50),
    }
    .clamped();
    let filter = WantedListFilter {
        status: params.status,
        kind: params.kind,
        series_id: params.series_id,
        path: params.path,
    };

    let (items, total) = state
        .wanted
        .repository()
        .list(&filter, page, per_page)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;

    Ok(Json(PaginatedResponse::new(items, total, page, per_page)))
}

/// Counts per status
#[utoipa::path(
    get,
    path = "/api/v1/wanted/stats",
    tag = "wanted",
    responses((status = 200, description = "Counts per status", body = WantedStats))
)]
pub async fn wanted_stats(
    State(state): State<AppState>,
    context: RequestContext,
) -> Result<Json<WantedStats>, Response> {
    let stats = state
        .wanted
        .repository()
        .stats()
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(stats))
}

/// Trigger an immediate library scan
#[utoipa::path(
    post,
    path = "/api/v1/wanted/refresh",
    tag = "wanted",
    responses((status = 202, description = "Scan scheduled", body = RefreshResponse))
)]
pub async fn refresh_wanted(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler.request_scan();
    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            status: "scheduled".to_string(),
        }),
    )
}

/// Force one processing iteration for a single item
#[utoipa::path(
    post,
    path = "/api/v1/wanted/{id}/process",
    tag = "wanted",
    params(("id" = i64, Path, description = "Wanted item id")),
    responses(
        (status = 200, description = "Processing outcome", body = ProcessOutcome),
        (status = 404, description = "Unknown wanted item")
    )
)]
pub async fn process_wanted(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<ProcessOutcome>, Response> {
    let outcome = state
        .wanted
        .process_item(id)
        .await
        .map_err(|e| error_response(&context, e))?;
    Ok(Json(outcome))
}

/// Stop retrying an item permanently
#[utoipa::path(
    post,
    path = "/api/v1/wanted/{id}/blacklist",
    tag = "wanted",
    params(("id" = i64, Path, description = "Wanted item id")),
    responses(
        (status = 200, description = "Item blacklisted", body = WantedItem),
        (status = 404, description = "Unknown wanted item")
    )
)]
pub async fn blacklist_wanted(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<WantedItem>, Response> {
    let item = state
        .wanted
        .blacklist_item(id)
        .await
        .map_err(|e| error_response(&context, e))?;
    Ok(Json(item))
}
