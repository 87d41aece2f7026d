//! Provider registry endpoints

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::ProviderStatistics;
use crate::providers::ProviderManifest;
use crate::utils::circuit_breaker::BreakerStatus;
use crate::web::AppState;
use crate::web::extractors::RequestContext;
use crate::web::responses::error_response;

/// One provider as shown on the providers page
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderView {
    pub manifest: ProviderManifest,
    pub enabled: bool,
    pub score_modifier: i32,
    pub stats: ProviderStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModifierRequest {
    pub modifier: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetBreakerResponse {
    pub provider: String,
    pub reset: bool,
}

/// Registry listing with per-provider stats and breaker state
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses((status = 200, description = "Registered providers", body = [ProviderView]))
)]
pub async fn list_providers(
    State(state): State<AppState>,
    context: RequestContext,
) -> Result<Json<Vec<ProviderView>>, Response> {
    let config = state.config.read().await;
    let modifiers = state
        .scoring
        .all_provider_modifiers()
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;

    let mut views = Vec::new();
    for provider in state.registry.all() {
        let name = provider.name().to_string();
        let stats = state
            .provider_stats
            .get(&name)
            .await
            .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?
            .unwrap_or_else(|| ProviderStatistics::empty(&name));

        views.push(ProviderView {
            manifest: provider.manifest(),
            enabled: config.providers.is_enabled(&name),
            score_modifier: modifiers.get(&name).copied().unwrap_or(0),
            stats,
            breaker: state.breakers.status(&name),
        });
    }
    Ok(Json(views))
}

/// Force a provider's circuit breaker back to closed
#[utoipa::path(
    post,
    path = "/api/v1/providers/{name}/reset-breaker",
    tag = "providers",
    params(("name" = String, Path, description = "Provider name")),
    responses(
        (status = 200, description = "Breaker reset", body = ResetBreakerResponse),
        (status = 404, description = "Unknown provider")
    )
)]
pub async fn reset_breaker(
    State(state): State<AppState>,
    context: RequestContext,
    Path(name): Path<String>,
) -> Result<Json<ResetBreakerResponse>, Response> {
    if state.registry.get(&name).is_none() {
        return Err(error_response(
            &context,
            AppError::not_found("provider", &name),
        ));
    }
    let reset = state.breakers.reset(&name);
    Ok(Json(ResetBreakerResponse {
        provider: name,
        reset,
    }))
}

/// Read the score modifier for a provider
#[utoipa::path(
    get,
    path = "/api/v1/providers/{name}/modifier",
    tag = "providers",
    params(("name" = String, Path, description = "Provider name")),
    responses((status = 200, description = "Current modifier", body = ModifierRequest))
)]
pub async fn get_modifier(
    State(state): State<AppState>,
    context: RequestContext,
    Path(name): Path<String>,
) -> Result<Json<ModifierRequest>, Response> {
    let modifier = state
        .scoring
        .provider_modifier(&name)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(ModifierRequest { modifier }))
}

/// Set the per-provider score bias added to every raw score
#[utoipa::path(
    put,
    path = "/api/v1/providers/{name}/modifier",
    tag = "providers",
    params(("name" = String, Path, description = "Provider name")),
    request_body = ModifierRequest,
    responses(
        (status = 200, description = "Modifier stored", body = ModifierRequest),
        (status = 404, description = "Unknown provider")
    )
)]
pub async fn set_modifier(
    State(state): State<AppState>,
    context: RequestContext,
    Path(name): Path<String>,
    Json(body): Json<ModifierRequest>,
) -> Result<Json<ModifierRequest>, Response> {
    if state.registry.get(&name).is_none() {
        return Err(error_response(
            &context,
            AppError::not_found("provider", &name),
        ));
    }
    state
        .scoring
        .set_provider_modifier(&name, body.modifier)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(body))
}
