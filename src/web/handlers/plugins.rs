//! Plugin endpoints

use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::providers::plugins::PluginLoadError;
use crate::web::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PluginsView {
    pub loaded: Vec<String>,
    pub errors: Vec<PluginLoadError>,
    pub plugins_dir: String,
}

/// Loaded plugins and per-file errors from the last scan
#[utoipa::path(
    get,
    path = "/api/v1/plugins",
    tag = "plugins",
    responses((status = 200, description = "Plugin status", body = PluginsView))
)]
pub async fn list_plugins(State(state): State<AppState>) -> Json<PluginsView> {
    Json(PluginsView {
        loaded: state.plugin_manager.loaded(),
        errors: state.plugin_manager.errors(),
        plugins_dir: state.plugin_manager.plugins_dir().display().to_string(),
    })
}

/// Re-discover the plugin directory now
#[utoipa::path(
    post,
    path = "/api/v1/plugins/reload",
    tag = "plugins",
    responses((status = 200, description = "Reload result", body = PluginsView))
)]
pub async fn reload_plugins(State(state): State<AppState>) -> Json<PluginsView> {
    let (loaded, errors) = state.plugin_manager.reload().await;
    Json(PluginsView {
        loaded,
        errors,
        plugins_dir: state.plugin_manager.plugins_dir().display().to_string(),
    })
}
