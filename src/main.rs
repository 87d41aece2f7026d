use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sublarr::{
    cache::create_cache_backend,
    config::{Config, SharedConfig},
    database::Database,
    database::repositories::{
        BlacklistRepository, ConfigEntryRepository, ProviderStatsRepository, ScoringRepository,
        SubtitleDownloadRepository, UpgradeHistoryRepository, WantedRepository,
        WatchedFolderRepository,
    },
    events::EventBus,
    providers::{ProviderAggregator, ProviderRegistry, builtin::create_builtin_providers},
    providers::plugins::{PluginManager, watcher::start_plugin_watcher},
    scheduler::{LibraryScanner, SchedulerService},
    utils::CircuitBreakerRegistry,
    utils::http_client::create_untimed_http_client,
    wanted::WantedService,
    web::{AppState, WebServer},
    webhook::WebhookPipeline,
};

#[derive(Parser)]
#[command(name = "sublarr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Subtitle management service with provider aggregation")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sublarr={}", cli.log_level).into());
    tracing_subscriber::registry()
        .with(log_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sublarr v{}", env!("CARGO_PKG_VERSION"));

    // File/env settings first; database overrides are applied after the
    // connection is up
    let mut settings = Config::load(&cli.config)?;
    apply_cli_overrides(&mut settings, &cli);

    let database = Database::new(&settings.database).await?;
    database.migrate().await?;
    let connection = database.connection();

    let config_entries = ConfigEntryRepository::new(connection.clone());
    let overrides = config_entries
        .all()
        .await
        .context("Failed to read config overrides")?;
    if !overrides.is_empty() {
        info!("Applying {} config override(s) from database", overrides.len());
        settings = Config::load_with_overrides(&cli.config, &overrides)?;
        apply_cli_overrides(&mut settings, &cli);
    }

    let config: SharedConfig = Arc::new(tokio::sync::RwLock::new(settings.clone()));
    let events = Arc::new(EventBus::new());
    let shutdown = CancellationToken::new();

    // Process-wide resources: response cache, breakers, provider registry
    let cache = create_cache_backend(&settings.cache.redis_url).await;
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        settings.circuit_breaker.failure_threshold,
        Duration::from_secs(settings.circuit_breaker.cooldown_seconds),
    ));

    let http_client = create_untimed_http_client(&settings.web.user_agent)?;
    let registry = Arc::new(ProviderRegistry::new(create_builtin_providers(
        &settings.providers.settings,
        http_client.clone(),
    ))?);

    let plugin_manager = Arc::new(PluginManager::new(
        settings.plugins.dir.clone(),
        registry.clone(),
        config.clone(),
        http_client.clone(),
        events.clone(),
    ));
    plugin_manager.reload().await;
    if settings.plugins.watch
        && let Err(e) = start_plugin_watcher(plugin_manager.clone(), shutdown.clone())
    {
        warn!("Plugin hot reload unavailable: {e}");
    }

    // Repositories
    let wanted_repo = WantedRepository::new(connection.clone());
    let downloads = SubtitleDownloadRepository::new(connection.clone());
    let upgrades = UpgradeHistoryRepository::new(connection.clone());
    let blacklist = BlacklistRepository::new(connection.clone());
    let provider_stats = ProviderStatsRepository::new(connection.clone());
    let scoring = ScoringRepository::new(connection.clone());
    let watched_folders = WatchedFolderRepository::new(connection.clone());

    // Service layer
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
        aggregator.clone(),
        upgrades.clone(),
        downloads.clone(),
        events.clone(),
        config.clone(),
        http_client.clone(),
    ));
    let scanner = Arc::new(LibraryScanner::new(
        config.clone(),
        wanted_repo.clone(),
        watched_folders.clone(),
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

    let scheduler = SchedulerService::new(
        wanted.clone(),
        scanner.clone(),
        config.clone(),
        shutdown.clone(),
    );
    let scheduler_handle = scheduler.handle();
    let scheduler_task = tokio::spawn(scheduler.run());

    let state = AppState {
        database: database.clone(),
        config: config.clone(),
        config_path: cli.config.clone(),
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

    let server = WebServer::new(state).await?;
    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(server.run(server_shutdown));

    // Shutdown on ctrl-c or SIGTERM; tasks observe the token between items
    wait_for_shutdown_signal().await;
    info!("Shutdown signal received");
    shutdown.cancel();

    let _ = scheduler_task.await;
    match server_task.await {
        Ok(result) => result?,
        Err(e) => warn!("Web server task join failed: {e}"),
    }

    info!("Sublarr stopped");
    Ok(())
}

fn apply_cli_overrides(settings: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        settings.web.host = host.clone();
    }
    if let Some(port) = cli.port {
        settings.web.port = port;
    }
    if let Some(database_url) = &cli.database_url {
        settings.database.url = database_url.clone();
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
