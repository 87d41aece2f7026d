//! Settings endpoints
//!
//! `GET /config` returns the effective settings with secrets masked.
//! `PUT /config` persists dotted-key overrides to the database, reloads the
//! shared settings in place and publishes `config_updated`. Masked secret
//! values round-tripped from the UI are skipped so stored secrets survive.

use std::collections::BTreeMap;

use axum::{Json, extract::State, response::Response};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::config::{Config, SECRET_MASK, is_secret_key};
use crate::errors::AppError;
use crate::event_payload;
use crate::events::EventKind;
use crate::web::AppState;
use crate::web::extractors::RequestContext;
use crate::web::responses::error_response;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigUpdateResponse {
    pub status: String,
    pub updated_keys: Vec<String>,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

/// Current settings with secrets masked
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses((status = 200, description = "Effective settings (secrets masked)"))
)]
pub async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config.read().await;
    Json(config.safe_view())
}

/// Persist settings overrides and reload
#[utoipa::path(
    put,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Settings stored and reloaded", body = ConfigUpdateResponse),
        (status = 400, description = "No values provided or reload failed")
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    context: RequestContext,
    Json(values): Json<BTreeMap<String, serde_json::Value>>,
) -> Result<Json<ConfigUpdateResponse>, Response> {
    if values.is_empty() {
        return Err(error_response(
            &context,
            AppError::validation("no config values provided"),
        ));
    }

    let mut updated_keys = Vec::new();
    for (key, value) in values {
        let raw = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        // Masked placeholders mean "unchanged" for secret fields
        if raw == SECRET_MASK {
            continue;
        }
        let stored = if is_secret_key(&key) {
            raw.trim().to_string()
        } else {
            raw
        };
        state
            .config_entries
            .set(&key, &stored)
            .await
            .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
        updated_keys.push(key);
    }

    // Reload with all DB overrides applied over file/env settings
    let overrides = state
        .config_entries
        .all()
        .await
        .map_err(|e| error_response(&context, AppError::internal(e.to_string())))?;
    let reloaded = Config::load_with_overrides(&state.config_path, &overrides)
        .map_err(|e| error_response(&context, AppError::configuration(e.to_string())))?;

    {
        let mut config = state.config.write().await;
        *config = reloaded;
    }

    info!("Config updated: {:?}, settings reloaded", updated_keys);
    state.events.emit(
        EventKind::ConfigUpdated,
        event_payload! {
            "changed_keys" => updated_keys.join(","),
            "source" => "api",
        },
    );

    let config = state.config.read().await;
    Ok(Json(ConfigUpdateResponse {
        status: "saved".to_string(),
        updated_keys,
        config: config.safe_view(),
    }))
}
