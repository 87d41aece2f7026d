//! HTTP response types and error conversion
//!
//! Structured error bodies carry a machine code, the request id and an
//! optional troubleshooting hint, so operators can correlate log lines
//! with API failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

use super::extractors::RequestContext;

/// Structured error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub troubleshooting: Option<String>,
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: u64,
    /// Current page number (1-based)
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total.div_ceil(per_page);
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

/// HTTP status for each error class
fn status_for(error: &AppError) -> StatusCode {
    use crate::errors::{ProviderError, WebError};
    match error {
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Configuration { .. } => StatusCode::BAD_REQUEST,
        AppError::Web(WebError::InvalidAuth { .. }) => StatusCode::UNAUTHORIZED,
        AppError::Web(_) => StatusCode::BAD_REQUEST,
        AppError::OperationInProgress { .. } => StatusCode::CONFLICT,
        AppError::ExternalService { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
        AppError::Provider(ProviderError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
        AppError::Provider(_) => StatusCode::BAD_GATEWAY,
        AppError::InsufficientDiskSpace { .. } => StatusCode::INSUFFICIENT_STORAGE,
        AppError::Database(_) | AppError::Repository(_) | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Build the structured error response for a request
pub fn error_response(context: &RequestContext, error: AppError) -> Response {
    let status = status_for(&error);
    let body = ErrorBody {
        error: error.to_string(),
        code: error.code().to_string(),
        timestamp: chrono::Utc::now(),
        request_id: context.request_id.clone(),
        context: None,
        troubleshooting: error.troubleshooting(),
    };

    if status.is_server_error() {
        tracing::error!(
            "[{}] request {} failed: {}",
            body.code,
            body.request_id,
            body.error
        );
    } else {
        tracing::warn!(
            "[{}] request {} rejected: {}",
            body.code,
            body.request_id,
            body.error
        );
    }

    (status, Json(body)).into_response()
}

/// Handler result alias: success JSON or a structured error response
pub type ApiResult<T> = Result<Json<T>, Response>;

/// Map any application error into the structured response
pub fn api_error<E: Into<AppError>>(context: &RequestContext) -> impl Fn(E) -> Response + '_ {
    move |error| error_response(context, error.into())
}
