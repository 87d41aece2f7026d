//! Wanted-item lifecycle service
//!
//! Owns the processing step for a single wanted item: claim, search,
//! upgrade gate, install, state transition, events. Used by the scheduler
//! loop, the force-process endpoint and the webhook pipeline so all three
//! share identical semantics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::SharedConfig;
use crate::database::repositories::subtitle_download::DownloadRecordRequest;
use crate::database::repositories::upgrade_history::UpgradeRecordRequest;
use crate::database::repositories::{
    SubtitleDownloadRepository, UpgradeHistoryRepository, WantedRepository,
};
use crate::errors::{AppError, AppResult};
use crate::event_payload;
use crate::events::{EventBus, EventKind};
use crate::models::{
    DownloadSource, SearchQuery, SubtitleFormat, SubtitleKind, WantedItem, WantedStatus,
};
use crate::providers::ProviderAggregator;
use crate::translate::TranslateClient;
use crate::upgrade::{self, ExistingSubtitle};
use crate::utils::backoff::retry_delay;
use crate::utils::release::{compute_file_hash, parse_release_tokens};

/// Formats probed when looking for an already-installed subtitle
const KNOWN_FORMATS: [SubtitleFormat; 4] = [
    SubtitleFormat::Ass,
    SubtitleFormat::Ssa,
    SubtitleFormat::Srt,
    SubtitleFormat::Vtt,
];

/// Outcome of one processing iteration
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Fresh install of a new subtitle
    Installed {
        installed_path: String,
        provider_name: String,
        score: i32,
    },
    /// An existing subtitle was replaced
    Upgraded {
        installed_path: String,
        provider_name: String,
        old_score: i32,
        new_score: i32,
        reason: String,
    },
    /// A candidate existed but did not beat the installed subtitle
    KeptExisting { reason: String },
    /// No acceptable candidate; retry scheduled
    NoResult { retry_after_seconds: u64 },
    /// Another worker holds the claim for this item
    AlreadyProcessing,
}

pub struct WantedService {
    repo: WantedRepository,
    aggregator: Arc<ProviderAggregator>,
    upgrades: UpgradeHistoryRepository,
    downloads: SubtitleDownloadRepository,
    events: Arc<EventBus>,
    config: SharedConfig,
    http_client: reqwest::Client,
}

impl WantedService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: WantedRepository,
        aggregator: Arc<ProviderAggregator>,
        upgrades: UpgradeHistoryRepository,
        downloads: SubtitleDownloadRepository,
        events: Arc<EventBus>,
        config: SharedConfig,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            repo,
            aggregator,
            upgrades,
            downloads,
            events,
            config,
            http_client,
        }
    }

    pub fn repository(&self) -> &WantedRepository {
        &self.repo
    }

    /// Run one full processing iteration for a wanted item.
    ///
    /// Claims the row first so concurrent workers (scheduler tick vs.
    /// force-process vs. webhook) never operate on the same id. State
    /// transitions are strictly `searching -> done | failed`.
    pub async fn process_item(&self, id: i64) -> AppResult<ProcessOutcome> {
        let item = self
            .repo
            .get(id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?
            .ok_or_else(|| AppError::not_found("wanted item", id))?;

        let watchdog_secs = {
            let config = self.config.read().await;
            config.search.provider_search_timeout_seconds + config.search.searching_grace_seconds
        };
        let now = Utc::now();
        let watchdog_deadline = now + chrono::Duration::seconds(watchdog_secs as i64);
        let claimed = self
            .repo
            .claim(id, now, watchdog_deadline)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
        if !claimed {
            debug!("Wanted item {id} already claimed, skipping");
            return Ok(ProcessOutcome::AlreadyProcessing);
        }

        let outcome = self.process_claimed(&item).await;
        match outcome {
            Ok(outcome) => {
                self.emit_processed(&item, &outcome);
                Ok(outcome)
            }
            Err(error) => {
                // Hard failures still release the claim via the failure path
                warn!("Processing wanted item {id} failed: {error}");
                let retry_after = self.schedule_retry(&item).await?;
                let outcome = ProcessOutcome::NoResult {
                    retry_after_seconds: retry_after,
                };
                self.emit_processed(&item, &outcome);
                Ok(outcome)
            }
        }
    }

    async fn process_claimed(&self, item: &WantedItem) -> AppResult<ProcessOutcome> {
        let query = self.build_query(item).await;

        let best = self
            .aggregator
            .search_and_select(&query)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;

        let Some(best) = best else {
            let retry_after = self.schedule_retry(item).await?;
            return Ok(ProcessOutcome::NoResult {
                retry_after_seconds: retry_after,
            });
        };

        // Upgrade gate only applies when a subtitle is already installed
        if let Some(existing_path) = self.find_existing_subtitle(item)
            && let Some(existing) = upgrade::score_existing_subtitle(&existing_path)
        {
            return self.process_upgrade(item, existing, &existing_path, best).await;
        }

        let install = self
            .aggregator
            .download_and_install(&best, &item.media_file_path)
            .await?;
        self.repo
            .mark_done(item.id, Utc::now(), install.score)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;

        Ok(ProcessOutcome::Installed {
            installed_path: install.installed_path,
            provider_name: install.provider_name,
            score: install.score,
        })
    }

    async fn process_upgrade(
        &self,
        item: &WantedItem,
        existing: ExistingSubtitle,
        existing_path: &std::path::Path,
        best: crate::models::ScoredCandidate,
    ) -> AppResult<ProcessOutcome> {
        let policy = {
            let config = self.config.read().await;
            config.upgrade
        };

        let decision = upgrade::decide(
            existing,
            best.candidate.format,
            best.effective_score,
            &policy,
        );
        if !decision.upgrade {
            debug!(
                "Keeping existing subtitle for {}: {}",
                item.media_file_path, decision.reason
            );
            self.repo
                .mark_done(item.id, Utc::now(), existing.score)
                .await
                .map_err(|e| AppError::internal(e.to_string()))?;
            return Ok(ProcessOutcome::KeptExisting {
                reason: decision.reason,
            });
        }

        let install = self
            .aggregator
            .download_and_install(&best, &item.media_file_path)
            .await?;

        // The candidate may install under a different extension; drop the
        // superseded file when the name changed
        if existing_path != std::path::Path::new(&install.installed_path)
            && let Err(e) = tokio::fs::remove_file(existing_path).await
        {
            warn!(
                "Could not remove superseded subtitle {}: {e}",
                existing_path.display()
            );
        }

        self.upgrades
            .record(UpgradeRecordRequest {
                media_file_path: item.media_file_path.clone(),
                old_format: existing.format,
                old_score: existing.score,
                new_format: install.format,
                new_score: install.score,
                provider_name: install.provider_name.clone(),
                reason: decision.reason.clone(),
            })
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;

        self.repo
            .mark_done(item.id, Utc::now(), install.score)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;

        self.events.emit(
            EventKind::UpgradeComplete,
            event_payload! {
                "title" => item.title.clone().unwrap_or_default(),
                "old_format" => existing.format.to_string(),
                "new_format" => install.format.to_string(),
                "old_score" => existing.score,
                "new_score" => install.score,
                "provider_name" => install.provider_name.clone(),
            },
        );

        info!(
            "Upgraded subtitle for {}: {} -> {} ({})",
            item.media_file_path, existing.format, install.format, decision.reason
        );
        Ok(ProcessOutcome::Upgraded {
            installed_path: install.installed_path,
            provider_name: install.provider_name,
            old_score: existing.score,
            new_score: install.score,
            reason: decision.reason,
        })
    }

    /// Permanently stop retrying an item.
    ///
    /// The row stays visible in listings with status `blacklisted`; the
    /// scheduler never picks it up again and claims reject it.
    pub async fn blacklist_item(&self, id: i64) -> AppResult<WantedItem> {
        let item = self
            .repo
            .get(id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?
            .ok_or_else(|| AppError::not_found("wanted item", id))?;

        self.repo
            .mark_blacklisted(id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
        info!(
            "Wanted item {id} blacklisted, no further searches for {}",
            item.media_file_path
        );

        self.events.emit(
            EventKind::WantedItemProcessed,
            event_payload! {
                "item_id" => id,
                "title" => item.title.clone().unwrap_or_default(),
                "status" => WantedStatus::Blacklisted.to_string(),
            },
        );

        self.repo
            .get(id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?
            .ok_or_else(|| AppError::not_found("wanted item", id))
    }

    /// Local pipeline fallback: produce the subtitle via the configured
    /// speech-to-text / translation sidecar
    pub async fn translate_fallback(&self, id: i64) -> AppResult<ProcessOutcome> {
        let item = self
            .repo
            .get(id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?
            .ok_or_else(|| AppError::not_found("wanted item", id))?;

        let translate_config = {
            let config = self.config.read().await;
            config.translate.clone()
        };
        if !translate_config.is_configured() {
            return Err(AppError::configuration_with_hint(
                "local translation pipeline is not configured",
                "Set translate.url to your speech-to-text sidecar in Settings.",
            ));
        }

        let client = TranslateClient::new(&translate_config, self.http_client.clone());
        match client
            .generate_subtitle(&item.media_file_path, &item.target_language)
            .await
        {
            Ok(output_path) => {
                self.downloads
                    .record(DownloadRecordRequest {
                        provider_name: "local".to_string(),
                        external_id: String::new(),
                        language: item.target_language.clone(),
                        format: SubtitleFormat::parse(
                            std::path::Path::new(&output_path)
                                .extension()
                                .and_then(|e| e.to_str())
                                .unwrap_or("srt"),
                        ),
                        installed_path: output_path.clone(),
                        score: 0,
                        subtitle_kind: item.subtitle_kind,
                        source: DownloadSource::LocalStt,
                    })
                    .await
                    .map_err(|e| AppError::internal(e.to_string()))?;
                self.repo
                    .mark_done(item.id, Utc::now(), 0)
                    .await
                    .map_err(|e| AppError::internal(e.to_string()))?;
                self.events.emit(
                    EventKind::TranslationComplete,
                    event_payload! {
                        "target_language" => item.target_language.clone(),
                        "title" => item.title.clone().unwrap_or_default(),
                    },
                );
                Ok(ProcessOutcome::Installed {
                    installed_path: output_path,
                    provider_name: "local".to_string(),
                    score: 0,
                })
            }
            Err(error) => {
                self.events.emit(
                    EventKind::TranslationFailed,
                    event_payload! {
                        "target_language" => item.target_language.clone(),
                        "error" => error.to_string(),
                        "title" => item.title.clone().unwrap_or_default(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Compute and persist the adaptive retry delay; returns the delay in
    /// seconds
    async fn schedule_retry(&self, item: &WantedItem) -> AppResult<u64> {
        let (base, cap) = {
            let config = self.config.read().await;
            (
                Duration::from_secs(config.search.retry_backoff_base_seconds),
                Duration::from_secs(config.search.retry_backoff_cap_seconds),
            )
        };

        let attempt = (item.search_count + 1).max(1) as u32;
        let delay = retry_delay(base, cap, attempt);
        let now = Utc::now();
        let retry_after = now + chrono::Duration::from_std(delay).unwrap_or_default();

        self.repo
            .mark_failed(item.id, now, retry_after)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
        debug!(
            "Wanted item {} scheduled for retry in {}",
            item.id,
            humantime::format_duration(delay)
        );
        Ok(delay.as_secs())
    }

    /// Build the provider query fingerprint from the item and its filename
    async fn build_query(&self, item: &WantedItem) -> SearchQuery {
        let tokens = parse_release_tokens(&item.media_file_path);
        let title = item
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| tokens.title.clone());

        SearchQuery {
            kind: Some(item.kind),
            media_file_path: item.media_file_path.clone(),
            series_title: Some(title.clone()),
            title,
            season: tokens.season,
            episode: tokens.episode,
            year: tokens.year,
            language: item.target_language.clone(),
            subtitle_kind: Some(item.subtitle_kind),
            file_hash: compute_file_hash(&item.media_file_path),
            release_group: tokens.release_group,
            source: tokens.source,
            resolution: tokens.resolution,
            audio_codec: tokens.audio_codec,
        }
    }

    /// Look for an already-installed subtitle next to the media file
    pub fn find_existing_subtitle(&self, item: &WantedItem) -> Option<PathBuf> {
        for format in KNOWN_FORMATS {
            let path = crate::providers::aggregator::install_path(
                &item.media_file_path,
                &item.target_language,
                item.subtitle_kind,
                format,
            );
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    fn emit_processed(&self, item: &WantedItem, outcome: &ProcessOutcome) {
        let (status, provider, score) = match outcome {
            ProcessOutcome::Installed {
                provider_name,
                score,
                ..
            } => (WantedStatus::Done, provider_name.clone(), *score),
            ProcessOutcome::Upgraded {
                provider_name,
                new_score,
                ..
            } => (WantedStatus::Done, provider_name.clone(), *new_score),
            ProcessOutcome::KeptExisting { .. } => {
                (WantedStatus::Done, String::new(), item.current_score)
            }
            ProcessOutcome::NoResult { .. } => (WantedStatus::Failed, String::new(), 0),
            ProcessOutcome::AlreadyProcessing => return,
        };

        let season_episode = match (item.kind, parse_release_tokens(&item.media_file_path)) {
            (crate::models::MediaKind::Episode, tokens) => match (tokens.season, tokens.episode) {
                (Some(s), Some(e)) => format!("S{s:02}E{e:02}"),
                _ => String::new(),
            },
            _ => String::new(),
        };

        self.events.emit(
            EventKind::WantedItemProcessed,
            event_payload! {
                "item_id" => item.id,
                "title" => item.title.clone().unwrap_or_default(),
                "season_episode" => season_episode,
                "status" => status.to_string(),
                "provider_name" => provider,
                "score" => score,
            },
        );
    }
}

/// Sibling-subtitle presence check used by the library scan: is a subtitle
/// of this language and kind already installed for the media file?
pub fn has_subtitle(media_file_path: &str, language: &str, kind: SubtitleKind) -> bool {
    KNOWN_FORMATS.iter().any(|format| {
        crate::providers::aggregator::install_path(media_file_path, language, kind, *format)
            .exists()
    })
}
