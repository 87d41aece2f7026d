//! Web layer
//!
//! HTTP interface for the service: thin handlers over the service layer,
//! standardized responses, request-id middleware and optional API key
//! authentication. All routes live under `/api/v1`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::SharedConfig;
use crate::database::Database;
use crate::database::repositories::{
    BlacklistRepository, ConfigEntryRepository, ProviderStatsRepository, ScoringRepository,
    SubtitleDownloadRepository, UpgradeHistoryRepository,
};
use crate::events::EventBus;
use crate::providers::ProviderRegistry;
use crate::providers::plugins::PluginManager;
use crate::scheduler::SchedulerHandle;
use crate::utils::CircuitBreakerRegistry;
use crate::wanted::WantedService;
use crate::webhook::WebhookPipeline;

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod responses;

pub use extractors::{PaginationParams, RequestContext};
pub use responses::{ErrorBody, PaginatedResponse};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: SharedConfig,
    pub config_path: PathBuf,
    pub events: Arc<EventBus>,
    pub registry: Arc<ProviderRegistry>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub cache: Arc<dyn ResponseCache>,
    pub plugin_manager: Arc<PluginManager>,
    pub wanted: Arc<WantedService>,
    pub webhook: Arc<WebhookPipeline>,
    pub scheduler: SchedulerHandle,
    pub provider_stats: ProviderStatsRepository,
    pub scoring: ScoringRepository,
    pub blacklist: BlacklistRepository,
    pub downloads: SubtitleDownloadRepository,
    pub upgrades: UpgradeHistoryRepository,
    pub config_entries: ConfigEntryRepository,
}

/// Web server setup and lifecycle
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub async fn new(state: AppState) -> Result<Self> {
        let (host, port) = {
            let config = state.config.read().await;
            (config.web.host.clone(), config.web.port)
        };
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    fn create_router(state: AppState) -> Router {
        let api = Router::new()
            .route("/health", get(handlers::health::health))
            .route("/wanted", get(handlers::wanted::list_wanted))
            .route("/wanted/stats", get(handlers::wanted::wanted_stats))
            .route("/wanted/refresh", post(handlers::wanted::refresh_wanted))
            .route("/wanted/{id}/process", post(handlers::wanted::process_wanted))
            .route(
                "/wanted/{id}/blacklist",
                post(handlers::wanted::blacklist_wanted),
            )
            .route("/providers", get(handlers::providers::list_providers))
            .route(
                "/providers/{name}/reset-breaker",
                post(handlers::providers::reset_breaker),
            )
            .route(
                "/providers/{name}/modifier",
                get(handlers::providers::get_modifier).put(handlers::providers::set_modifier),
            )
            .route(
                "/scoring/weights",
                get(handlers::scoring::get_weights).put(handlers::scoring::set_weights),
            )
            .route(
                "/scoring/weights/reset",
                post(handlers::scoring::reset_weights),
            )
            .route("/plugins", get(handlers::plugins::list_plugins))
            .route("/plugins/reload", post(handlers::plugins::reload_plugins))
            .route("/webhook/sonarr", post(handlers::webhooks::sonarr_webhook))
            .route("/webhook/radarr", post(handlers::webhooks::radarr_webhook))
            .route(
                "/blacklist",
                get(handlers::blacklist::list_blacklist).post(handlers::blacklist::add_blacklist),
            )
            .route(
                "/blacklist/{id}",
                delete(handlers::blacklist::delete_blacklist),
            )
            .route("/history", get(handlers::history::list_downloads))
            .route("/history/upgrades", get(handlers::history::list_upgrades))
            .route(
                "/config",
                get(handlers::config::get_config).put(handlers::config::update_config),
            )
            .route("/cache/stats", get(handlers::cache::cache_stats))
            .route("/cache/clear", post(handlers::cache::cache_clear))
            .route("/events", get(handlers::events::event_catalog))
            .route("/events/stream", get(handlers::events::event_stream))
            .layer(axum_middleware::from_fn_with_state(
                state.config.clone(),
                middleware::api_key_middleware,
            ));

        Router::new()
            .nest("/api/v1", api)
            .route("/api-docs/openapi.json", get(openapi::openapi_json))
            .layer(axum_middleware::from_fn(middleware::request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the shutdown token fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        info!("Web server listening on {}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("Web server failed")?;
        Ok(())
    }

    /// Router for in-process testing
    pub fn router(state: AppState) -> Router {
        Self::create_router(state)
    }
}
