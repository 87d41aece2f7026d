//! Webhook pipeline
//!
//! Multi-stage orchestrator behind the Sonarr/Radarr webhook endpoints.
//! The HTTP handler enqueues a job and returns immediately; the pipeline
//! runs delay, re-scan, search and translate stages on a background task,
//! each individually toggleable. A failed stage is recorded but never
//! aborts the stages after it.
//!
//! Deduplication: each enqueue bumps a per-path generation. A running
//! pipeline checks its generation between stages and after the delay, so
//! when a newer webhook arrives for the same file the older pipeline
//! completes as a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::SharedConfig;
use crate::event_payload;
use crate::events::{EventBus, EventKind};
use crate::integrations::{RadarrClient, SonarrClient};
use crate::models::{MediaKind, NewWantedItem, SubtitleKind, WantedStatus};
use crate::wanted::WantedService;

/// Which upstream manager sent the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    Sonarr,
    Radarr,
}

impl WebhookSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookSource::Sonarr => "sonarr",
            WebhookSource::Radarr => "radarr",
        }
    }
}

/// A download-complete notification resolved to a local media file
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub source: WebhookSource,
    pub media_file_path: String,
    pub title: String,
    pub series_id: Option<i64>,
    pub movie_id: Option<i64>,
}

/// Outcome of one pipeline stage, accumulated into the result payload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StageResult {
    pub stage: &'static str,
    pub success: bool,
    pub detail: String,
}

pub struct WebhookPipeline {
    wanted: Arc<WantedService>,
    config: SharedConfig,
    events: Arc<EventBus>,
    http_client: reqwest::Client,
    shutdown: CancellationToken,
    /// Latest generation per media file path; stale generations no-op
    generations: Mutex<HashMap<String, u64>>,
}

impl WebhookPipeline {
    pub fn new(
        wanted: Arc<WantedService>,
        config: SharedConfig,
        events: Arc<EventBus>,
        http_client: reqwest::Client,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            wanted,
            config,
            events,
            http_client,
            shutdown,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a pipeline run for a download event; returns immediately
    pub fn enqueue(self: &Arc<Self>, job: WebhookJob) {
        let generation = {
            let mut generations = self.generations.lock().expect("latch lock poisoned");
            let counter = generations.entry(job.media_file_path.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        info!(
            "Webhook pipeline queued for {} (generation {generation})",
            job.media_file_path
        );
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(job, generation).await;
        });
    }

    /// Eager handling of delete events: drop all wanted rows for the path
    pub async fn handle_delete(&self, media_file_path: &str) -> anyhow::Result<u64> {
        let removed = self
            .wanted
            .repository()
            .delete_by_path(media_file_path)
            .await?;
        info!("Removed {removed} wanted item(s) for deleted file {media_file_path}");
        Ok(removed)
    }

    fn is_current(&self, path: &str, generation: u64) -> bool {
        let generations = self.generations.lock().expect("latch lock poisoned");
        generations.get(path).copied() == Some(generation)
    }

    async fn run(&self, job: WebhookJob, generation: u64) {
        let webhook_config = {
            let config = self.config.read().await;
            config.webhook.clone()
        };
        let mut stages: Vec<StageResult> = Vec::new();

        // Stage 1: configurable delay, so the file settles and the upstream
        // manager finishes its own import bookkeeping
        let delay = Duration::from_secs(webhook_config.delay_minutes * 60);
        if !delay.is_zero() {
            debug!(
                "Webhook pipeline for {} sleeping {}m",
                job.media_file_path, webhook_config.delay_minutes
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return,
            }
        }
        if !self.is_current(&job.media_file_path, generation) {
            debug!(
                "Webhook pipeline for {} superseded during delay, exiting",
                job.media_file_path
            );
            return;
        }

        // Stage 2: re-scan via the upstream manager. A failure here does
        // not gate the search stage; the wanted item may already exist.
        if webhook_config.auto_scan {
            let result = self.stage_rescan(&job).await;
            self.emit_stage(&job, &result);
            stages.push(result);
        }
        if self.shutdown.is_cancelled() || !self.is_current(&job.media_file_path, generation) {
            return;
        }

        // Stage 3: ensure wanted items exist and process them
        let mut unresolved: Vec<i64> = Vec::new();
        if webhook_config.auto_search {
            let (result, remaining) = self.stage_search(&job).await;
            self.emit_stage(&job, &result);
            stages.push(result);
            unresolved = remaining;
        }
        if self.shutdown.is_cancelled() || !self.is_current(&job.media_file_path, generation) {
            return;
        }

        // Stage 4: local pipeline fallback for anything still unresolved
        if webhook_config.auto_translate && !unresolved.is_empty() {
            let result = self.stage_translate(&unresolved).await;
            self.emit_stage(&job, &result);
            stages.push(result);
        }

        let succeeded = stages.iter().all(|s| s.success);
        info!(
            "Webhook pipeline completed for {} ({} stage(s), success: {succeeded})",
            job.media_file_path,
            stages.len()
        );
        self.events.emit(
            EventKind::WebhookCompleted,
            event_payload! {
                "source" => job.source.as_str(),
                "title" => job.title.clone(),
                "stages" => stages.len(),
                "succeeded" => succeeded,
            },
        );
    }

    async fn stage_rescan(&self, job: &WebhookJob) -> StageResult {
        let (sonarr_config, radarr_config) = {
            let config = self.config.read().await;
            (config.sonarr.clone(), config.radarr.clone())
        };

        let outcome = match (job.source, job.series_id, job.movie_id) {
            (WebhookSource::Sonarr, Some(series_id), _) if sonarr_config.is_configured() => {
                SonarrClient::new(&sonarr_config, self.http_client.clone())
                    .rescan_series(series_id)
                    .await
                    .map(|_| format!("rescanned series {series_id}"))
            }
            (WebhookSource::Radarr, _, Some(movie_id)) if radarr_config.is_configured() => {
                RadarrClient::new(&radarr_config, self.http_client.clone())
                    .rescan_movie(movie_id)
                    .await
                    .map(|_| format!("rescanned movie {movie_id}"))
            }
            _ => Ok("no linked id or manager not configured, skipped".to_string()),
        };

        match outcome {
            Ok(detail) => StageResult {
                stage: "scan",
                success: true,
                detail,
            },
            Err(e) => {
                warn!("Webhook re-scan stage failed: {e}");
                StageResult {
                    stage: "scan",
                    success: false,
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Upsert wanted items for the file and process each; returns the ids
    /// that are still unresolved afterwards
    async fn stage_search(&self, job: &WebhookJob) -> (StageResult, Vec<i64>) {
        let library_config = {
            let config = self.config.read().await;
            config.library.clone()
        };
        let kinds: Vec<SubtitleKind> = library_config
            .subtitle_kinds
            .iter()
            .filter_map(|k| k.parse().ok())
            .collect();
        let media_kind = if job.source == WebhookSource::Sonarr {
            MediaKind::Episode
        } else {
            MediaKind::Movie
        };

        let mut processed = 0usize;
        let mut resolved = 0usize;
        let mut unresolved: Vec<i64> = Vec::new();
        for language in &library_config.languages {
            for kind in &kinds {
                let upserted = self
                    .wanted
                    .repository()
                    .upsert(&NewWantedItem {
                        kind: media_kind,
                        media_file_path: job.media_file_path.clone(),
                        target_language: language.clone(),
                        subtitle_kind: *kind,
                        upgrade_candidate: false,
                        current_score: 0,
                        series_id: job.series_id,
                        episode_id: None,
                        movie_id: job.movie_id,
                        title: Some(job.title.clone()),
                    })
                    .await;

                let id = match upserted {
                    Ok((id, _)) => id,
                    Err(e) => {
                        warn!("Webhook wanted upsert failed: {e}");
                        continue;
                    }
                };

                processed += 1;
                match self.wanted.process_item(id).await {
                    Ok(outcome) => {
                        use crate::wanted::ProcessOutcome;
                        match outcome {
                            ProcessOutcome::Installed { .. }
                            | ProcessOutcome::Upgraded { .. }
                            | ProcessOutcome::KeptExisting { .. } => resolved += 1,
                            ProcessOutcome::NoResult { .. } => unresolved.push(id),
                            ProcessOutcome::AlreadyProcessing => {}
                        }
                    }
                    Err(e) => {
                        warn!("Webhook processing of wanted item {id} failed: {e}");
                        unresolved.push(id);
                    }
                }
            }
        }

        let result = StageResult {
            stage: "search",
            success: processed > 0,
            detail: format!("{resolved}/{processed} item(s) resolved"),
        };
        (result, unresolved)
    }

    async fn stage_translate(&self, unresolved: &[i64]) -> StageResult {
        let mut produced = 0usize;
        for &id in unresolved {
            // Items another path resolved in the meantime are skipped
            match self.wanted.repository().get(id).await {
                Ok(Some(item)) if item.status != WantedStatus::Done => {}
                _ => continue,
            }
            match self.wanted.translate_fallback(id).await {
                Ok(_) => produced += 1,
                Err(e) => warn!("Translate fallback for wanted item {id} failed: {e}"),
            }
        }

        StageResult {
            stage: "translate",
            success: produced > 0 || unresolved.is_empty(),
            detail: format!("{produced}/{} item(s) produced locally", unresolved.len()),
        }
    }

    fn emit_stage(&self, job: &WebhookJob, result: &StageResult) {
        self.events.emit(
            EventKind::WebhookStageComplete,
            event_payload! {
                "source" => job.source.as_str(),
                "title" => job.title.clone(),
                "stage" => result.stage,
                "success" => result.success,
            },
        );
    }
}
