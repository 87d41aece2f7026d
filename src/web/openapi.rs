//! OpenAPI documentation
//!
//! The generated document is served at `/api-docs/openapi.json` for API
//! explorers and client generators.

use axum::Json;
use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sublarr API",
        description = "Subtitle management service: wanted-item lifecycle, provider aggregation, upgrades and webhooks",
        license(name = "MIT")
    ),
    paths(
        handlers::health::health,
        handlers::wanted::list_wanted,
        handlers::wanted::wanted_stats,
        handlers::wanted::refresh_wanted,
        handlers::wanted::process_wanted,
        handlers::wanted::blacklist_wanted,
        handlers::providers::list_providers,
        handlers::providers::reset_breaker,
        handlers::providers::get_modifier,
        handlers::providers::set_modifier,
        handlers::scoring::get_weights,
        handlers::scoring::set_weights,
        handlers::scoring::reset_weights,
        handlers::plugins::list_plugins,
        handlers::plugins::reload_plugins,
        handlers::webhooks::sonarr_webhook,
        handlers::webhooks::radarr_webhook,
        handlers::blacklist::list_blacklist,
        handlers::blacklist::add_blacklist,
        handlers::blacklist::delete_blacklist,
        handlers::history::list_downloads,
        handlers::history::list_upgrades,
        handlers::config::get_config,
        handlers::config::update_config,
        handlers::cache::cache_stats,
        handlers::cache::cache_clear,
        handlers::events::event_catalog,
        handlers::events::event_stream,
    ),
    tags(
        (name = "system", description = "Health and diagnostics"),
        (name = "wanted", description = "Wanted-item lifecycle"),
        (name = "providers", description = "Provider registry and statistics"),
        (name = "scoring", description = "Scoring weight configuration"),
        (name = "plugins", description = "Provider plugin management"),
        (name = "webhooks", description = "Upstream manager notifications"),
        (name = "blacklist", description = "Release blacklist"),
        (name = "history", description = "Download and upgrade history"),
        (name = "config", description = "Settings"),
        (name = "cache", description = "Response cache"),
        (name = "events", description = "Event catalog and push channel"),
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
