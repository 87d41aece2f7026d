//! Blacklist endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::{BlacklistEntry, NewBlacklistEntry};
use crate::web::AppState;
use crate::web::extractors::{PaginationParams, RequestContext};
use crate::web::responses::{PaginatedResponse, error_response};

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct BlacklistDeleted {
    pub deleted: bool,
}

/// Paginated blacklist listing
#[utoipa::path(
    get,
    path = "/api/v1/blacklist",
    tag = "blacklist",
    params(PaginationParams),
    responses((status = 200, description = "Blacklist entries", body = PaginatedResponse<BlacklistEntry>))
)]
pub async fn list_blacklist(
    State(state): State<AppState>,
    context: RequestContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<BlacklistEntry>>, Response> {
    let (page, per_page) = pagination.clamped();
    let (items, total) = state
        .blacklist
        .list(page, per_page)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(PaginatedResponse::new(items, total, page, per_page)))
}

/// Block a release from ever being downloaded again
#[utoipa::path(
    post,
    path = "/api/v1/blacklist",
    tag = "blacklist",
    request_body = NewBlacklistEntry,
    responses((status = 201, description = "Entry stored", body = BlacklistEntry))
)]
pub async fn add_blacklist(
    State(state): State<AppState>,
    context: RequestContext,
    Json(request): Json<NewBlacklistEntry>,
) -> Result<Response, Response> {
    if request.provider_name.is_empty() || request.external_id.is_empty() {
        return Err(error_response(
            &context,
            AppError::validation("provider_name and external_id are required"),
        ));
    }
    let entry = state
        .blacklist
        .add(request)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

/// Remove one blacklist entry
#[utoipa::path(
    delete,
    path = "/api/v1/blacklist/{id}",
    tag = "blacklist",
    params(("id" = i64, Path, description = "Blacklist entry id")),
    responses(
        (status = 200, description = "Entry removed", body = BlacklistDeleted),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn delete_blacklist(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<BlacklistDeleted>, Response> {
    let deleted = state
        .blacklist
        .delete(id)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    if !deleted {
        return Err(error_response(
            &context,
            AppError::not_found("blacklist entry", id),
        ));
    }
    Ok(Json(BlacklistDeleted { deleted }))
}
