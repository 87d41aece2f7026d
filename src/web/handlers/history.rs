//! Download and upgrade history endpoints

use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};

use crate::errors::AppError;
use crate::models::{SubtitleDownload, UpgradeRecord};
use crate::web::AppState;
use crate::web::extractors::{PaginationParams, RequestContext};
use crate::web::responses::{PaginatedResponse, error_response};

/// Paginated download history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "history",
    params(PaginationParams),
    responses((status = 200, description = "Download records", body = PaginatedResponse<SubtitleDownload>))
)]
pub async fn list_downloads(
    State(state): State<AppState>,
    context: RequestContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<SubtitleDownload>>, Response> {
    let (page, per_page) = pagination.clamped();
    let (items, total) = state
        .downloads
        .list(page, per_page)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(PaginatedResponse::new(items, total, page, per_page)))
}

/// Paginated upgrade history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/history/upgrades",
    tag = "history",
    params(PaginationParams),
    responses((status = 200, description = "Upgrade records", body = PaginatedResponse<UpgradeRecord>))
)]
pub async fn list_upgrades(
    State(state): State<AppState>,
    context: RequestContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<UpgradeRecord>>, Response> {
    let (page, per_page) = pagination.clamped();
    let (items, total) = state
        .upgrades
        .list(page, per_page)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(PaginatedResponse::new(items, total, page, per_page)))
}
