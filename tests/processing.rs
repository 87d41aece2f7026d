//! End-to-end processing against a fake provider
//!
//! Covers the fresh-install flow, the upgrade gate, no-result backoff and
//! circuit breaker behaviour without touching the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sublarr::cache::MemoryCacheBackend;
use sublarr::config::{Config, DatabaseConfig, SharedConfig};
use sublarr::database::Database;
use sublarr::database::repositories::{
    BlacklistRepository, ProviderStatsRepository, ScoringRepository, SubtitleDownloadRepository,
    UpgradeHistoryRepository, WantedRepository,
};
use sublarr::errors::{ProviderError, ProviderResult};
use sublarr::events::EventBus;
use sublarr::models::{
    MediaKind, NewWantedItem, SearchQuery, SubtitleCandidate, SubtitleFormat, SubtitleKind,
    WantedStatus,
};
use sublarr::providers::{
    ProviderAggregator, ProviderManifest, ProviderRegistry, SubtitleProvider,
};
use sublarr::utils::circuit_breaker::{BreakerState, CircuitBreakerRegistry};
use sublarr::wanted::{ProcessOutcome, WantedService};

/// What the fake provider does on search
#[derive(Clone, Copy)]
enum Behaviour {
    /// Return one hash-matched candidate of the given format
    Offer(SubtitleFormat),
    /// Return no candidates
    Empty,
    /// Fail with a transport error
    Fail,
}

struct FakeProvider {
    name: String,
    behaviour: Behaviour,
    search_calls: AtomicU32,
    download_calls: AtomicU32,
}

impl FakeProvider {
    fn new(name: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behaviour,
            search_calls: AtomicU32::new(0),
            download_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SubtitleProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn manifest(&self) -> ProviderManifest {
        ProviderManifest {
            name: self.name.clone(),
            version: "0.0.0".to_string(),
            ..Default::default()
        }
    }

    async fn search(&self, query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Offer(format) => Ok(vec![SubtitleCandidate {
                provider_name: self.name.clone(),
                external_id: "sub-1".to_string(),
                language: query.language.clone(),
                format,
                filename: format!("release.{}", format.extension()),
                release_info: String::new(),
                download_url: None,
                hearing_impaired: false,
                hash_match: true,
                metadata: BTreeMap::new(),
            }]),
            Behaviour::Empty => Ok(Vec::new()),
            Behaviour::Fail => Err(ProviderError::Http {
                provider: self.name.clone(),
                status: 500,
                message: "boom".to_string(),
            }),
        }
    }

    async fn download(&self, _candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"[Script Info]\nTitle: fake\n".to_vec())
    }
}

struct Harness {
    wanted: Arc<WantedService>,
    repo: WantedRepository,
    downloads: SubtitleDownloadRepository,
    upgrades: UpgradeHistoryRepository,
    breakers: Arc<CircuitBreakerRegistry>,
    _media_dir: tempfile::TempDir,
    media_path: String,
}

async fn harness(provider: Arc<FakeProvider>) -> Harness {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
    })
    .await
    .unwrap();
    database.migrate().await.unwrap();
    let connection = database.connection();

    let media_dir = tempfile::tempdir().unwrap();
    let media_path = media_dir
        .path()
        .join("Show.Name.S01E01.1080p.mkv")
        .to_string_lossy()
        .to_string();
    std::fs::write(&media_path, b"not really video").unwrap();

    let mut settings = Config::default();
    // The destination is a temp dir; keep the free-space floor permissive
    settings.library.min_free_disk_mb = 1;
    settings.search.min_score = 60;
    settings.search.provider_search_timeout_seconds = 5;
    settings.search.provider_download_timeout_seconds = 5;
    settings.circuit_breaker.failure_threshold = 3;
    settings.circuit_breaker.cooldown_seconds = 60;
    let config: SharedConfig = Arc::new(tokio::sync::RwLock::new(settings));

    let events = Arc::new(EventBus::new());
    let registry = Arc::new(ProviderRegistry::new(vec![provider as Arc<dyn SubtitleProvider>]).unwrap());
    let breakers = Arc::new(CircuitBreakerRegistry::new(3, Duration::from_secs(60)));
    let cache = Arc::new(MemoryCacheBackend::new());

    let repo = WantedRepository::new(connection.clone());
    let downloads = SubtitleDownloadRepository::new(connection.clone());
    let upgrades = UpgradeHistoryRepository::new(connection.clone());

    let aggregator = Arc::new(ProviderAggregator::new(
        registry,
        cache,
        breakers.clone(),
        ProviderStatsRepository::new(connection.clone()),
        ScoringRepository::new(connection.clone()),
        BlacklistRepository::new(connection.clone()),
        downloads.clone(),
        events.clone(),
        config.clone(),
    ));

    let wanted = Arc::new(WantedService::new(
        repo.clone(),
        aggregator,
        upgrades.clone(),
        downloads.clone(),
        events,
        config,
        reqwest::Client::new(),
    ));

    Harness {
        wanted,
        repo,
        downloads,
        upgrades,
        breakers,
        _media_dir: media_dir,
        media_path,
    }
}

fn new_item(path: &str) -> NewWantedItem {
    NewWantedItem {
        kind: MediaKind::Episode,
        media_file_path: path.to_string(),
        target_language: "de".to_string(),
        subtitle_kind: SubtitleKind::Full,
        upgrade_candidate: false,
        current_score: 0,
        series_id: Some(1),
        episode_id: Some(1),
        movie_id: None,
        title: Some("Show Name".to_string()),
    }
}

#[tokio::test]
async fn fresh_install_writes_sibling_and_records_download() {
    let provider = FakeProvider::new("fake", Behaviour::Offer(SubtitleFormat::Ass));
    let harness = harness(provider.clone()).await;

    let (id, created) = harness.repo.upsert(&new_item(&harness.media_path)).await.unwrap();
    assert!(created);

    let outcome = harness.wanted.process_item(id).await.unwrap();
    let ProcessOutcome::Installed {
        installed_path,
        provider_name,
        score,
    } = outcome
    else {
        panic!("expected an install, got {outcome:?}");
    };

    assert!(installed_path.ends_with(".de.ass"));
    assert_eq!(provider_name, "fake");
    assert!(score > 0);
    assert!(std::path::Path::new(&installed_path).exists());

    let item = harness.repo.get(id).await.unwrap().unwrap();
    assert_eq!(item.status, WantedStatus::Done);
    assert_eq!(item.current_score, score);

    let (history, total) = harness.downloads.list(1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(history[0].provider_name, "fake");
    assert_eq!(history[0].format, SubtitleFormat::Ass);

    // A fresh install is not an upgrade
    assert_eq!(harness.upgrades.count().await.unwrap(), 0);
    assert_eq!(provider.download_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upgrade_replaces_srt_with_ass_and_records_history() {
    let provider = FakeProvider::new("fake", Behaviour::Offer(SubtitleFormat::Ass));
    let harness = harness(provider).await;

    // Pre-existing SRT install next to the media file
    let existing = harness.media_path.replace(".mkv", ".de.srt");
    std::fs::write(&existing, b"1\n00:00:01,000 --> 00:00:02,000\nold\n").unwrap();

    let (id, _) = harness.repo.upsert(&new_item(&harness.media_path)).await.unwrap();
    let outcome = harness.wanted.process_item(id).await.unwrap();

    let ProcessOutcome::Upgraded {
        installed_path,
        old_score,
        new_score,
        ..
    } = outcome
    else {
        panic!("expected an upgrade, got {outcome:?}");
    };
    assert!(installed_path.ends_with(".de.ass"));
    assert!(new_score > old_score);

    // The superseded SRT is gone, the upgrade is on record
    assert!(!std::path::Path::new(&existing).exists());
    assert_eq!(harness.upgrades.count().await.unwrap(), 1);
    let (records, _) = harness.upgrades.list(1, 10).await.unwrap();
    assert_eq!(records[0].old_format, SubtitleFormat::Srt);
    assert_eq!(records[0].new_format, SubtitleFormat::Ass);
}

#[tokio::test]
async fn no_result_schedules_adaptive_retry() {
    let provider = FakeProvider::new("fake", Behaviour::Empty);
    let harness = harness(provider).await;

    let (id, _) = harness.repo.upsert(&new_item(&harness.media_path)).await.unwrap();
    let outcome = harness.wanted.process_item(id).await.unwrap();

    let ProcessOutcome::NoResult {
        retry_after_seconds,
    } = outcome
    else {
        panic!("expected no-result, got {outcome:?}");
    };
    assert!(retry_after_seconds >= 900);

    let item = harness.repo.get(id).await.unwrap().unwrap();
    assert_eq!(item.status, WantedStatus::Failed);
    assert!(item.retry_after.is_some());
    assert_eq!(item.search_count, 1);

    // It is not silently dropped: still listed, just not yet due
    assert!(harness.repo.list_due(chrono::Utc::now(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn provider_failures_trip_the_breaker_and_skip_further_calls() {
    let provider = FakeProvider::new("flaky", Behaviour::Fail);
    let harness = harness(provider.clone()).await;

    let (id, _) = harness.repo.upsert(&new_item(&harness.media_path)).await.unwrap();

    // Three failing passes trip the breaker (threshold 3)
    for _ in 0..3 {
        let outcome = harness.wanted.process_item(id).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::NoResult { .. }));
        // Make it due again immediately for the next pass
        harness
            .repo
            .mark_failed(id, chrono::Utc::now(), chrono::Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();
    }
    assert_eq!(provider.search_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        harness.breakers.breaker_for("flaky").state(),
        BreakerState::Open
    );

    // The fourth pass skips the provider entirely
    let outcome = harness.wanted.process_item(id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::NoResult { .. }));
    assert_eq!(provider.search_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn search_responses_are_served_from_cache_within_ttl() {
    let provider = FakeProvider::new("fake", Behaviour::Empty);
    let harness = harness(provider.clone()).await;

    let (id, _) = harness.repo.upsert(&new_item(&harness.media_path)).await.unwrap();

    harness.wanted.process_item(id).await.unwrap();
    harness
        .repo
        .mark_failed(id, chrono::Utc::now(), chrono::Utc::now() - chrono::Duration::seconds(1))
        .await
        .unwrap();
    harness.wanted.process_item(id).await.unwrap();

    // Second pass hit the cache, not the provider
    assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
}
