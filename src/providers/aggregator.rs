//! Provider aggregation
//!
//! Turns a search intent into either a best candidate or no-result. Each
//! provider call is gated by its circuit breaker, served from the response
//! cache when fresh, bounded by a wall-clock timeout, and recorded in the
//! provider statistics. Per-provider failures are isolated here and never
//! propagate to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::config::{ProvidersConfig, SharedConfig};
use crate::database::repositories::subtitle_download::DownloadRecordRequest;
use crate::database::repositories::{
    BlacklistRepository, ProviderStatsRepository, ScoringRepository, SubtitleDownloadRepository,
};
use crate::errors::{AppError, ProviderError};
use crate::event_payload;
use crate::events::{EventBus, EventKind};
use crate::models::{
    DownloadSource, ScoredCandidate, SearchQuery, SubtitleCandidate, SubtitleFormat, SubtitleKind,
};
use crate::utils::CircuitBreakerRegistry;
use crate::utils::disk::available_space_mb;

use super::detection::classify_candidate;
use super::registry::ProviderRegistry;
use super::scoring::ScoringEngine;

/// Fallback rate-limit cooldown when the server sends no Retry-After
const DEFAULT_RATE_LIMIT_COOLDOWN_SECS: u64 = 600;

/// Result of a successful download + install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub installed_path: String,
    pub provider_name: String,
    pub external_id: String,
    pub format: SubtitleFormat,
    pub subtitle_kind: SubtitleKind,
    pub score: i32,
}

pub struct ProviderAggregator {
    registry: Arc<ProviderRegistry>,
    cache: Arc<dyn ResponseCache>,
    breakers: Arc<CircuitBreakerRegistry>,
    stats: ProviderStatsRepository,
    scoring: ScoringRepository,
    blacklist: BlacklistRepository,
    downloads: SubtitleDownloadRepository,
    events: Arc<EventBus>,
    config: SharedConfig,
}

impl ProviderAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<dyn ResponseCache>,
        breakers: Arc<CircuitBreakerRegistry>,
        stats: ProviderStatsRepository,
        scoring: ScoringRepository,
        blacklist: BlacklistRepository,
        downloads: SubtitleDownloadRepository,
        events: Arc<EventBus>,
        config: SharedConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            breakers,
            stats,
            scoring,
            blacklist,
            downloads,
            events,
            config,
        }
    }

    /// Fan out the search across all eligible providers and score the
    /// surviving candidates
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredCandidate>> {
        let (providers_config, cache_config, search_timeout) = {
            let config = self.config.read().await;
            (
                config.providers.clone(),
                config.cache.clone(),
                Duration::from_secs(config.search.provider_search_timeout_seconds),
            )
        };

        let engine = ScoringEngine::new(
            self.scoring.weight_overrides("episode").await?,
            self.scoring.weight_overrides("movie").await?,
        );
        let modifiers = self.scoring.all_provider_modifiers().await?;
        let blocked = self.blacklist.blocked_releases().await?;

        let mut all_scored: Vec<ScoredCandidate> = Vec::new();
        let now = Utc::now();

        for provider in self.registry.all() {
            let name = provider.name().to_string();

            if !providers_config.is_enabled(&name) {
                continue;
            }
            let manifest = provider.manifest();
            if !manifest.languages.is_empty()
                && !manifest.languages.iter().any(|l| l == &query.language)
            {
                debug!("Skipping {name}: language '{}' not declared", query.language);
                continue;
            }
            if self.stats.is_disabled(&name, now).await.unwrap_or(false) {
                debug!("Skipping {name}: auto-disabled (rate-limit cooldown)");
                continue;
            }
            let breaker = self.breakers.breaker_for(&name);
            if !breaker.allow_request() {
                debug!("Skipping {name}: circuit breaker open");
                continue;
            }

            let cache_key = search_cache_key(&name, query);
            let (candidates, latency_ms, from_cache) = match self.cached_candidates(&cache_key).await
            {
                Some(candidates) => (candidates, 0, true),
                None => {
                    let started = std::time::Instant::now();
                    match timeout(search_timeout, provider.search(query)).await {
                        Ok(Ok(candidates)) => {
                            let latency_ms = started.elapsed().as_millis() as u64;
                            breaker.record_success();
                            if let Ok(serialized) = serde_json::to_string(&candidates) {
                                let ttl = cache_config.ttl_for_provider(&name);
                                if let Err(e) = self.cache.set(&cache_key, &serialized, ttl).await {
                                    debug!("Response cache set failed for {name}: {e}");
                                }
                            }
                            (candidates, latency_ms, false)
                        }
                        Ok(Err(error)) => {
                            let latency_ms = started.elapsed().as_millis() as u64;
                            self.handle_search_failure(&name, &error, latency_ms, query)
                                .await;
                            continue;
                        }
                        Err(_) => {
                            let latency_ms = search_timeout.as_millis() as u64;
                            let error = ProviderError::Timeout {
                                provider: name.clone(),
                            };
                            self.handle_search_failure(&name, &error, latency_ms, query)
                                .await;
                            continue;
                        }
                    }
                }
            };

            // Blacklist and kind gating, then scoring
            let wanted_kind = query.subtitle_kind.unwrap_or(SubtitleKind::Full);
            let modifier = modifiers.get(&name).copied().unwrap_or(0);
            let mut provider_scored: Vec<ScoredCandidate> = Vec::new();
            for candidate in candidates {
                if blocked.contains(&(candidate.provider_name.clone(), candidate.external_id.clone()))
                {
                    debug!(
                        "Dropping blacklisted candidate {}:{}",
                        candidate.provider_name, candidate.external_id
                    );
                    continue;
                }
                let (detected_kind, confidence) = classify_candidate(&candidate);
                if detected_kind != wanted_kind {
                    continue;
                }
                let raw_score = engine.score(query, &candidate);
                provider_scored.push(ScoredCandidate {
                    raw_score,
                    effective_score: raw_score + modifier,
                    detected_kind,
                    detection_confidence: confidence,
                    search_latency_ms: latency_ms,
                    candidate,
                });
            }

            let best_raw = provider_scored.iter().map(|c| c.raw_score).max();
            if !from_cache
                && let Err(e) = self.stats.record_success(&name, best_raw, latency_ms).await
            {
                warn!("Failed to update stats for {name}: {e}");
            }

            self.events.emit(
                EventKind::ProviderSearchComplete,
                event_payload! {
                    "provider_name" => name.clone(),
                    "result_count" => provider_scored.len(),
                    "best_score" => best_raw.unwrap_or(0),
                    "title" => query.title.clone(),
                },
            );

            all_scored.extend(provider_scored);
        }

        Ok(all_scored)
    }

    async fn cached_candidates(&self, cache_key: &str) -> Option<Vec<SubtitleCandidate>> {
        let raw = self.cache.get(cache_key).await.ok()??;
        match serde_json::from_str(&raw) {
            Ok(candidates) => {
                debug!("Provider search served from cache: {cache_key}");
                Some(candidates)
            }
            Err(e) => {
                debug!("Discarding undecodable cache entry {cache_key}: {e}");
                None
            }
        }
    }

    /// Record a failed provider call: breaker, stats, failure event.
    /// Rate limits set a per-session cooldown instead of tripping the
    /// breaker.
    async fn handle_search_failure(
        &self,
        name: &str,
        error: &ProviderError,
        latency_ms: u64,
        query: &SearchQuery,
    ) {
        let breaker = self.breakers.breaker_for(name);
        let disabled_until = match error {
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => {
                let cooldown = retry_after_secs.unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN_SECS);
                warn!("Provider {name} rate limited, cooling down {cooldown}s");
                Some(Utc::now() + chrono::Duration::seconds(cooldown as i64))
            }
            _ => {
                breaker.record_failure();
                None
            }
        };

        if let Err(e) = self
            .stats
            .record_failure(name, latency_ms, disabled_until)
            .await
        {
            warn!("Failed to update stats for {name}: {e}");
        }

        warn!("Provider {name} search failed: {error}");
        self.events.emit(
            EventKind::ProviderFailed,
            event_payload! {
                "provider_name" => name,
                "error" => error.to_string(),
                "error_type" => error_type(error),
                "title" => query.title.clone(),
            },
        );
    }

    /// Search, then pick the best candidate above the language's minimum
    /// score. Returns `None` for no-result.
    pub async fn search_and_select(&self, query: &SearchQuery) -> Result<Option<ScoredCandidate>> {
        let scored = self.search(query).await?;
        let (providers_config, min_score) = {
            let config = self.config.read().await;
            (
                config.providers.clone(),
                config.search.min_score_for(&query.language),
            )
        };
        Ok(select_best(scored, &providers_config, min_score))
    }

    /// Download the chosen candidate and install it next to the media file.
    ///
    /// Fails loudly when the destination volume is low on space. The write
    /// is a temp-sibling plus atomic rename so readers never observe a
    /// partial subtitle.
    pub async fn download_and_install(
        &self,
        best: &ScoredCandidate,
        media_file_path: &str,
    ) -> Result<InstallOutcome, AppError> {
        let candidate = &best.candidate;
        let name = candidate.provider_name.clone();

        let (download_timeout, min_free_mb) = {
            let config = self.config.read().await;
            (
                Duration::from_secs(config.search.provider_download_timeout_seconds),
                config.library.min_free_disk_mb,
            )
        };

        let provider = self
            .registry
            .get(&name)
            .ok_or(ProviderError::UnknownProvider {
                provider: name.clone(),
            })?;

        let breaker = self.breakers.breaker_for(&name);
        if !breaker.allow_request() {
            return Err(ProviderError::CircuitOpen { provider: name }.into());
        }

        let started = std::time::Instant::now();
        let content = match timeout(download_timeout, provider.download(candidate)).await {
            Ok(Ok(content)) => {
                breaker.record_success();
                content
            }
            Ok(Err(error)) => {
                breaker.record_failure();
                let _ = self
                    .stats
                    .record_failure(&name, started.elapsed().as_millis() as u64, None)
                    .await;
                return Err(error.into());
            }
            Err(_) => {
                breaker.record_failure();
                let _ = self
                    .stats
                    .record_failure(&name, download_timeout.as_millis() as u64, None)
                    .await;
                return Err(ProviderError::Timeout { provider: name }.into());
            }
        };

        let destination = install_path(
            media_file_path,
            &candidate.language,
            best.detected_kind,
            candidate.format,
        );
        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        if let Some(available_mb) = available_space_mb(&parent)
            && available_mb < min_free_mb
        {
            return Err(AppError::InsufficientDiskSpace {
                required_mb: min_free_mb,
                available_mb,
            });
        }

        write_atomically(&destination, &content)
            .await
            .map_err(|e| AppError::internal(format!("subtitle install failed: {e}")))?;

        let installed_path = destination.to_string_lossy().to_string();
        info!(
            "Installed subtitle {} from {} (score {})",
            installed_path, name, best.effective_score
        );

        let _ = self
            .stats
            .record_success(
                &name,
                Some(best.raw_score),
                started.elapsed().as_millis() as u64,
            )
            .await;

        self.downloads
            .record(DownloadRecordRequest {
                provider_name: name.clone(),
                external_id: candidate.external_id.clone(),
                language: candidate.language.clone(),
                format: candidate.format,
                installed_path: installed_path.clone(),
                score: best.effective_score,
                subtitle_kind: best.detected_kind,
                source: DownloadSource::Provider,
            })
            .await
            .map_err(|e| AppError::internal(format!("failed to record download: {e}")))?;

        self.events.emit(
            EventKind::SubtitleDownloaded,
            event_payload! {
                "provider_name" => name.clone(),
                "language" => candidate.language.clone(),
                "format" => candidate.format.to_string(),
                "score" => best.effective_score,
            },
        );

        Ok(InstallOutcome {
            installed_path,
            provider_name: name,
            external_id: candidate.external_id.clone(),
            format: candidate.format,
            subtitle_kind: best.detected_kind,
            score: best.effective_score,
        })
    }
}

/// Merge, order and threshold candidates from all providers.
///
/// Ordering: effective score descending, then provider preference order,
/// then lower search latency.
pub fn select_best(
    mut scored: Vec<ScoredCandidate>,
    providers: &ProvidersConfig,
    min_score: i32,
) -> Option<ScoredCandidate> {
    scored.sort_by(|a, b| {
        b.effective_score
            .cmp(&a.effective_score)
            .then_with(|| {
                providers
                    .preference_rank(&a.candidate.provider_name)
                    .cmp(&providers.preference_rank(&b.candidate.provider_name))
            })
            .then_with(|| a.search_latency_ms.cmp(&b.search_latency_ms))
    });

    let best = scored.into_iter().next()?;
    if best.effective_score < min_score {
        debug!(
            "Best candidate below minimum score ({} < {min_score})",
            best.effective_score
        );
        return None;
    }
    Some(best)
}

/// Destination path: media base + language tag (+ kind infix) + extension
pub fn install_path(
    media_file_path: &str,
    language: &str,
    kind: SubtitleKind,
    format: SubtitleFormat,
) -> PathBuf {
    let media = Path::new(media_file_path);
    let stem = media
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut name = format!("{stem}.{language}");
    if let Some(infix) = kind.path_infix() {
        name.push('.');
        name.push_str(infix);
    }
    name.push('.');
    name.push_str(format.extension());

    media.with_file_name(name)
}

/// Cache key for one provider search: short namespace plus a digest of the
/// query fingerprint
pub fn search_cache_key(provider_name: &str, query: &SearchQuery) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider_name.as_bytes());
    hasher.update(b"\0");
    if let Ok(fingerprint) = serde_json::to_vec(query) {
        hasher.update(&fingerprint);
    }
    let digest = hasher.finalize();
    let hex: String = digest[..12].iter().map(|b| format!("{b:02x}")).collect();
    format!("search:{provider_name}:{hex}")
}

async fn write_atomically(destination: &Path, content: &[u8]) -> std::io::Result<()> {
    let file_name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("subtitle");
    let temp = destination.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&temp, content).await?;
    match tokio::fs::rename(&temp, destination).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp).await;
            Err(e)
        }
    }
}

fn error_type(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::Timeout { .. } => "timeout",
        ProviderError::CircuitOpen { .. } => "circuit_open",
        ProviderError::RateLimited { .. } => "rate_limited",
        ProviderError::AuthenticationFailed { .. } => "auth_failed",
        ProviderError::InvalidResponse { .. } => "invalid_response",
        ProviderError::Http { .. } => "http",
        ProviderError::InvalidPlugin { .. } => "invalid_plugin",
        ProviderError::UnknownProvider { .. } => "unknown_provider",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use std::collections::BTreeMap;

    fn scored(provider: &str, effective: i32, latency: u64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: SubtitleCandidate {
                provider_name: provider.to_string(),
                external_id: "x".to_string(),
                language: "en".to_string(),
                format: SubtitleFormat::Srt,
                filename: "f.srt".to_string(),
                release_info: String::new(),
                download_url: None,
                hearing_impaired: false,
                hash_match: false,
                metadata: BTreeMap::new(),
            },
            raw_score: effective,
            effective_score: effective,
            detected_kind: SubtitleKind::Full,
            detection_confidence: 1.0,
            search_latency_ms: latency,
        }
    }

    #[test]
    fn best_selection_orders_by_score_then_preference_then_latency() {
        let providers = ProvidersConfig {
            preference_order: vec!["alpha".to_string(), "beta".to_string()],
            ..Default::default()
        };

        // Higher score wins regardless of preference
        let best = select_best(
            vec![scored("beta", 200, 50), scored("alpha", 150, 10)],
            &providers,
            0,
        )
        .unwrap();
        assert_eq!(best.candidate.provider_name, "beta");

        // Tie on score: preference order decides
        let best = select_best(
            vec![scored("beta", 200, 10), scored("alpha", 200, 50)],
            &providers,
            0,
        )
        .unwrap();
        assert_eq!(best.candidate.provider_name, "alpha");

        // Tie on score and preference (both unlisted): lower latency wins
        let best = select_best(
            vec![scored("gamma", 200, 80), scored("delta", 200, 20)],
            &ProvidersConfig::default(),
            0,
        )
        .unwrap();
        assert_eq!(best.candidate.provider_name, "delta");
    }

    #[test]
    fn below_threshold_yields_no_result() {
        let result = select_best(vec![scored("alpha", 40, 0)], &ProvidersConfig::default(), 60);
        assert!(result.is_none());
    }

    #[test]
    fn install_path_layout() {
        assert_eq!(
            install_path("/m/Show/S01E01.mkv", "de", SubtitleKind::Full, SubtitleFormat::Ass),
            PathBuf::from("/m/Show/S01E01.de.ass")
        );
        assert_eq!(
            install_path("/m/X.mkv", "en", SubtitleKind::Forced, SubtitleFormat::Srt),
            PathBuf::from("/m/X.en.forced.srt")
        );
        assert_eq!(
            install_path("/m/X.mkv", "ja", SubtitleKind::Signs, SubtitleFormat::Ass),
            PathBuf::from("/m/X.ja.signs.ass")
        );
    }

    #[test]
    fn cache_key_is_stable_and_query_sensitive() {
        let query_a = SearchQuery {
            kind: Some(MediaKind::Episode),
            title: "Show".to_string(),
            season: Some(1),
            episode: Some(1),
            language: "de".to_string(),
            ..Default::default()
        };
        let mut query_b = query_a.clone();

        assert_eq!(
            search_cache_key("opensubtitles", &query_a),
            search_cache_key("opensubtitles", &query_a)
        );
        assert_ne!(
            search_cache_key("opensubtitles", &query_a),
            search_cache_key("jimaku", &query_a)
        );

        query_b.episode = Some(2);
        assert_ne!(
            search_cache_key("opensubtitles", &query_a),
            search_cache_key("opensubtitles", &query_b)
        );
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("S01E01.de.ass");
        write_atomically(&dest, b"[Script Info]\n").await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"[Script Info]\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
