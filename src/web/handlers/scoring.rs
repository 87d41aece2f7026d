//! Scoring weight endpoints

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::providers::scoring::{default_episode_weights, default_movie_weights};
use crate::web::AppState;
use crate::web::extractors::RequestContext;
use crate::web::responses::error_response;

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoringWeightsView {
    pub episode: BTreeMap<String, i32>,
    pub movie: BTreeMap<String, i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoringWeightsUpdate {
    /// `episode` or `movie`
    pub score_type: String,
    pub weights: BTreeMap<String, i32>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct ScoringWeightsReset {
    /// Reset only this type; omit to reset both
    #[serde(default)]
    pub score_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoringWeightsResetResponse {
    pub removed_overrides: u64,
}

/// Effective weights: defaults merged with database overrides
#[utoipa::path(
    get,
    path = "/api/v1/scoring/weights",
    tag = "scoring",
    responses((status = 200, description = "Effective weights per kind", body = ScoringWeightsView))
)]
pub async fn get_weights(
    State(state): State<AppState>,
    context: RequestContext,
) -> Result<Json<ScoringWeightsView>, Response> {
    let mut episode = default_episode_weights();
    episode.extend(
        state
            .scoring
            .weight_overrides("episode")
            .await
            .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?,
    );
    let mut movie = default_movie_weights();
    movie.extend(
        state
            .scoring
            .weight_overrides("movie")
            .await
            .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?,
    );
    Ok(Json(ScoringWeightsView { episode, movie }))
}

/// Store weight overrides for one kind
#[utoipa::path(
    put,
    path = "/api/v1/scoring/weights",
    tag = "scoring",
    request_body = ScoringWeightsUpdate,
    responses(
        (status = 200, description = "Overrides stored", body = ScoringWeightsView),
        (status = 400, description = "Unknown score type")
    )
)]
pub async fn set_weights(
    State(state): State<AppState>,
    context: RequestContext,
    Json(update): Json<ScoringWeightsUpdate>,
) -> Result<Json<ScoringWeightsView>, Response> {
    if update.score_type != "episode" && update.score_type != "movie" {
        return Err(error_response(
            &context,
            AppError::validation("score_type must be 'episode' or 'movie'"),
        ));
    }
    state
        .scoring
        .set_weights(&update.score_type, &update.weights)
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;

    get_weights(State(state), context).await
}

/// Drop weight overrides, restoring the built-in defaults
#[utoipa::path(
    post,
    path = "/api/v1/scoring/weights/reset",
    tag = "scoring",
    request_body = ScoringWeightsReset,
    responses((status = 200, description = "Overrides removed", body = ScoringWeightsResetResponse))
)]
pub async fn reset_weights(
    State(state): State<AppState>,
    context: RequestContext,
    body: Option<Json<ScoringWeightsReset>>,
) -> Result<Json<ScoringWeightsResetResponse>, Response> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let removed = state
        .scoring
        .reset_weights(request.score_type.as_deref())
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    Ok(Json(ScoringWeightsResetResponse {
        removed_overrides: removed,
    }))
}
