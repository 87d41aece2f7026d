//! Sonarr/Radarr webhook endpoints
//!
//! Download events enqueue the webhook pipeline and return 202 before any
//! work happens. Delete events are handled eagerly: all wanted rows for
//! the deleted file are removed and the response carries the count.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::event_payload;
use crate::events::EventKind;
use crate::web::AppState;
use crate::web::extractors::RequestContext;
use crate::web::responses::error_response;
use crate::webhook::{WebhookJob, WebhookSource};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SonarrWebhookPayload {
    #[serde(default)]
    pub event_type: String,
    pub series: Option<SeriesInfo>,
    pub episode_file: Option<FileInfo>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RadarrWebhookPayload {
    #[serde(default)]
    pub event_type: String,
    pub movie: Option<MovieInfo>,
    pub movie_file: Option<FileInfo>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SeriesInfo {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MovieInfo {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FileInfo {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAccepted {
    pub status: String,
    pub file_path: String,
    pub delay_minutes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookDeleted {
    pub status: String,
    pub file_path: String,
    pub wanted_items_removed: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookIgnored {
    pub status: String,
    pub event: String,
}

/// Accept a Sonarr notification
#[utoipa::path(
    post,
    path = "/api/v1/webhook/sonarr",
    tag = "webhooks",
    request_body = SonarrWebhookPayload,
    responses(
        (status = 202, description = "Pipeline queued", body = WebhookAccepted),
        (status = 200, description = "Test, delete or ignored event")
    )
)]
pub async fn sonarr_webhook(
    State(state): State<AppState>,
    context: RequestContext,
    Json(payload): Json<SonarrWebhookPayload>,
) -> Result<Response, Response> {
    match payload.event_type.as_str() {
        "Test" => Ok(test_response()),
        "EpisodeFileDelete" => {
            let path = payload
                .episode_file
                .as_ref()
                .map(|f| f.path.clone())
                .unwrap_or_default();
            handle_delete(&state, &context, path).await
        }
        "Download" => {
            let path = payload
                .episode_file
                .as_ref()
                .map(|f| f.path.clone())
                .unwrap_or_default();
            if path.is_empty() {
                return Err(error_response(
                    &context,
                    AppError::validation("no file path in webhook payload"),
                ));
            }
            let series = payload.series.as_ref();
            enqueue(
                &state,
                WebhookSource::Sonarr,
                path,
                series.map(|s| s.title.clone()).unwrap_or_default(),
                series.and_then(|s| s.id),
                None,
            )
            .await
        }
        other => Ok(ignored_response(other)),
    }
}

/// Accept a Radarr notification
#[utoipa::path(
    post,
    path = "/api/v1/webhook/radarr",
    tag = "webhooks",
    request_body = RadarrWebhookPayload,
    responses(
        (status = 202, description = "Pipeline queued", body = WebhookAccepted),
        (status = 200, description = "Test, delete or ignored event")
    )
)]
pub async fn radarr_webhook(
    State(state): State<AppState>,
    context: RequestContext,
    Json(payload): Json<RadarrWebhookPayload>,
) -> Result<Response, Response> {
    match payload.event_type.as_str() {
        "Test" => Ok(test_response()),
        "MovieFileDelete" => {
            let path = payload
                .movie_file
                .as_ref()
                .map(|f| f.path.clone())
                .unwrap_or_default();
            handle_delete(&state, &context, path).await
        }
        "Download" => {
            let path = payload
                .movie_file
                .as_ref()
                .map(|f| f.path.clone())
                .unwrap_or_default();
            if path.is_empty() {
                return Err(error_response(
                    &context,
                    AppError::validation("no file path in webhook payload"),
                ));
            }
            let movie = payload.movie.as_ref();
            enqueue(
                &state,
                WebhookSource::Radarr,
                path,
                movie.map(|m| m.title.clone()).unwrap_or_default(),
                None,
                movie.and_then(|m| m.id),
            )
            .await
        }
        other => Ok(ignored_response(other)),
    }
}

async fn enqueue(
    state: &AppState,
    source: WebhookSource,
    remote_path: String,
    title: String,
    series_id: Option<i64>,
    movie_id: Option<i64>,
) -> Result<Response, Response> {
    let (file_path, delay_minutes) = {
        let config = state.config.read().await;
        (config.map_path(&remote_path), config.webhook.delay_minutes)
    };

    state.events.emit(
        EventKind::WebhookReceived,
        event_payload! {
            "source" => source.as_str(),
            "event_type" => "Download",
            "title" => title.clone(),
            "delay_minutes" => delay_minutes,
        },
    );

    state.webhook.enqueue(WebhookJob {
        source,
        media_file_path: file_path.clone(),
        title,
        series_id,
        movie_id,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAccepted {
            status: "queued".to_string(),
            file_path,
            delay_minutes,
        }),
    )
        .into_response())
}

async fn handle_delete(
    state: &AppState,
    context: &RequestContext,
    remote_path: String,
) -> Result<Response, Response> {
    if remote_path.is_empty() {
        return Ok(ignored_response("delete without file path"));
    }
    let file_path = {
        let config = state.config.read().await;
        config.map_path(&remote_path)
    };
    let removed = state
        .webhook
        .handle_delete(&file_path)
        .await
        .map_err(|e| error_response(context, AppError::internal(e.to_string())))?;

    Ok((
        StatusCode::OK,
        Json(WebhookDeleted {
            status: "deleted".to_string(),
            file_path,
            wanted_items_removed: removed,
        }),
    )
        .into_response())
}

fn test_response() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "message": "Test received" })),
    )
        .into_response()
}

fn ignored_response(event: &str) -> Response {
    (
        StatusCode::OK,
        Json(WebhookIgnored {
            status: "ignored".to_string(),
            event: event.to_string(),
        }),
    )
        .into_response()
}
