//! HTTP surface tests against the in-process router

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use sublarr::cache::MemoryCacheBackend;
use sublarr::config::{Config, DatabaseConfig, SharedConfig};
use sublarr::database::Database;
use sublarr::database::repositories::{
    BlacklistRepository, ConfigEntryRepository, ProviderStatsRepository, ScoringRepository,
    SubtitleDownloadRepository, UpgradeHistoryRepository, WantedRepository,
    WatchedFolderRepository,
};
use sublarr::events::EventBus;
use sublarr::models::{MediaKind, NewWantedItem, SubtitleKind};
use sublarr::providers::plugins::PluginManager;
use sublarr::providers::{ProviderAggregator, ProviderRegistry};
use sublarr::scheduler::{LibraryScanner, SchedulerService};
use sublarr::utils::CircuitBreakerRegistry;
use sublarr::wanted::WantedService;
use sublarr::web::{AppState, WebServer};
use sublarr::webhook::WebhookPipeline;

struct TestApp {
    router: Router,
    wanted_repo: WantedRepository,
    _plugins_dir: tempfile::TempDir,
    _config_file: tempfile::NamedTempFile,
}

async fn test_app(settings: Config) -> TestApp {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
    })
    .await
    .unwrap();
    database.migrate().await.unwrap();
    let connection = database.connection();

    let plugins_dir = tempfile::tempdir().unwrap();
    let config_file = tempfile::NamedTempFile::new().unwrap();

    let config: SharedConfig = Arc::new(tokio::sync::RwLock::new(settings));
    let events = Arc::new(EventBus::new());
    let shutdown = tokio_util::sync::CancellationToken::new();
    let http_client = reqwest::Client::new();

    let registry = Arc::new(ProviderRegistry::new(Vec::new()).unwrap());
    let breakers = Arc::new(CircuitBreakerRegistry::new(3, Duration::from_secs(60)));
    let cache = Arc::new(MemoryCacheBackend::new());

    let wanted_repo = WantedRepository::new(connection.clone());
    let downloads = SubtitleDownloadRepository::new(connection.clone());
    let upgrades = UpgradeHistoryRepository::new(connection.clone());
    let blacklist = BlacklistRepository::new(connection.clone());
    let provider_stats = ProviderStatsRepository::new(connection.clone());
    let scoring = ScoringRepository::new(connection.clone());
    let config_entries = ConfigEntryRepository::new(connection.clone());
    let watched_folders = WatchedFolderRepository::new(connection.clone());

    let aggregator = Arc::new(ProviderAggregator::new(
        registry.clone(),
        cache.clone(),
        breakers.clone(),
        provider_stats.clone(),
        scoring.clone(),
        blacklist.clone(),
        downloads.clone(),
        events.clone(),
        config.clone(),
    ));
    let wanted = Arc::new(WantedService::new(
        wanted_repo.clone(),
        aggregator,
        upgrades.clone(),
        downloads.clone(),
        events.clone(),
        config.clone(),
        http_client.clone(),
    ));
    let scanner = Arc::new(LibraryScanner::new(
        config.clone(),
        wanted_repo.clone(),
        watched_folders,
        events.clone(),
        http_client.clone(),
    ));
    let webhook = Arc::new(WebhookPipeline::new(
        wanted.clone(),
        config.clone(),
        events.clone(),
        http_client.clone(),
        shutdown.clone(),
    ));
    let plugin_manager = Arc::new(PluginManager::new(
        plugins_dir.path().to_path_buf(),
        registry.clone(),
        config.clone(),
        http_client,
        events.clone(),
    ));

    let scheduler = SchedulerService::new(wanted.clone(), scanner, config.clone(), shutdown);
    let scheduler_handle = scheduler.handle();
    drop(scheduler);

    let state = AppState {
        database,
        config,
        config_path: config_file.path().to_path_buf(),
        events,
        registry,
        breakers,
        cache,
        plugin_manager,
        wanted,
        webhook,
        scheduler: scheduler_handle,
        provider_stats,
        scoring,
        blacklist,
        downloads,
        upgrades,
        config_entries,
    };

    TestApp {
        router: WebServer::router(state),
        wanted_repo,
        _plugins_dir: plugins_dir,
        _config_file: config_file,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_connected_database() {
    let app = test_app(Config::default()).await;
    let response = app
        .router
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "connected");
}

#[tokio::test]
async fn radarr_delete_webhook_removes_wanted_rows() {
    let app = test_app(Config::default()).await;
    app.wanted_repo
        .upsert(&NewWantedItem {
            kind: MediaKind::Movie,
            media_file_path: "/m/Movie.mkv".to_string(),
            target_language: "de".to_string(),
            subtitle_kind: SubtitleKind::Full,
            upgrade_candidate: false,
            current_score: 0,
            series_id: None,
            episode_id: None,
            movie_id: Some(5),
            title: Some("Movie".to_string()),
        })
        .await
        .unwrap();

    let payload = serde_json::json!({
        "eventType": "MovieFileDelete",
        "movie": { "id": 5, "title": "Movie" },
        "movieFile": { "path": "/m/Movie.mkv" }
    });
    let response = app
        .router
        .oneshot(json_request("POST", "/api/v1/webhook/radarr", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["wanted_items_removed"], 1);
    assert_eq!(app.wanted_repo.stats().await.unwrap().total(), 0);
}

#[tokio::test]
async fn blacklisting_a_wanted_item_stops_retries() {
    let app = test_app(Config::default()).await;
    let (id, _) = app
        .wanted_repo
        .upsert(&NewWantedItem {
            kind: MediaKind::Episode,
            media_file_path: "/tv/Show/S01E01.mkv".to_string(),
            target_language: "de".to_string(),
            subtitle_kind: SubtitleKind::Full,
            upgrade_candidate: false,
            current_score: 0,
            series_id: Some(1),
            episode_id: Some(1),
            movie_id: None,
            title: Some("Show".to_string()),
        })
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/wanted/{id}/blacklist"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "blacklisted");

    // The item is out of the retry queue but still listed
    assert!(app
        .wanted_repo
        .list_due(chrono::Utc::now(), 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.wanted_repo.stats().await.unwrap().blacklisted, 1);

    let missing = app
        .router
        .oneshot(
            Request::post("/api/v1/wanted/999/blacklist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_test_events_are_acknowledged() {
    let app = test_app(Config::default()).await;
    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/webhook/sonarr",
            serde_json::json!({ "eventType": "Test" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sonarr_download_webhook_is_accepted_immediately() {
    let app = test_app(Config::default()).await;
    let payload = serde_json::json!({
        "eventType": "Download",
        "series": { "id": 12, "title": "Show Name" },
        "episodeFile": { "path": "/tv/Show Name/S01E01.mkv" }
    });

    let response = app
        .router
        .oneshot(json_request("POST", "/api/v1/webhook/sonarr", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["file_path"], "/tv/Show Name/S01E01.mkv");
}

#[tokio::test]
async fn blacklist_crud_roundtrip() {
    let app = test_app(Config::default()).await;

    let create = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/blacklist",
            serde_json::json!({
                "provider_name": "opensubtitles",
                "external_id": "9001",
                "language": "de",
                "media_file_path": "/m/Show/S01E01.mkv",
                "reason": "out of sync"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let created = body_json(create).await;
    let id = created["id"].as_i64().unwrap();

    let list = app
        .router
        .clone()
        .oneshot(Request::get("/api/v1/blacklist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let listed = body_json(list).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["external_id"], "9001");

    let delete = app
        .router
        .oneshot(
            Request::delete(format!("/api/v1/blacklist/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::OK);
}

#[tokio::test]
async fn config_endpoint_masks_secrets() {
    let mut settings = Config::default();
    settings.sonarr.url = "http://sonarr:8989".to_string();
    settings.sonarr.api_key = "super-secret-key".to_string();

    let app = test_app(settings).await;
    let response = app
        .router
        .oneshot(Request::get("/api/v1/config").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sonarr"]["api_key"], "***configured***");
    assert_eq!(body["sonarr"]["url"], "http://sonarr:8989");
}

#[tokio::test]
async fn api_key_guard_rejects_unkeyed_requests_but_not_health() {
    let mut settings = Config::default();
    settings.web.api_key = Some("sekrit".to_string());
    let app = test_app(settings).await;

    let denied = app
        .router
        .clone()
        .oneshot(Request::get("/api/v1/wanted").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(denied).await;
    assert_eq!(body["code"], "AUTH_001");

    let allowed = app
        .router
        .clone()
        .oneshot(
            Request::get("/api/v1/wanted")
                .header("x-api-key", "sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let health = app
        .router
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn event_catalog_is_served() {
    let app = test_app(Config::default()).await;
    let response = app
        .router
        .oneshot(Request::get("/api/v1/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"wanted_item_processed"));
    assert!(names.contains(&"subtitle_downloaded"));
}

#[tokio::test]
async fn responses_carry_request_ids() {
    let app = test_app(Config::default()).await;
    let response = app
        .router
        .oneshot(
            Request::post("/api/v1/wanted/999/process")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["request_id"].as_str().unwrap().len() >= 8);
}
