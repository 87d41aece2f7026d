//! Periodic library scan
//!
//! Walks the union of the upstream managers' libraries and the watched
//! folders, upserts a wanted item per configured (language, kind) pair
//! that is missing or upgradable, and drops wanted items whose media file
//! no longer exists.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::SharedConfig;
use crate::database::repositories::{WantedRepository, WatchedFolderRepository};
use crate::event_payload;
use crate::events::{EventBus, EventKind};
use crate::integrations::{LibraryFile, RadarrClient, SonarrClient};
use crate::models::{MediaKind, NewWantedItem, SubtitleFormat, SubtitleKind};
use crate::upgrade::score_existing_subtitle;
use crate::utils::release::parse_release_tokens;
use crate::wanted::has_subtitle;

/// File extensions treated as media during folder walks
const VIDEO_EXTENSIONS: [&str; 6] = ["mkv", "mp4", "avi", "mov", "wmv", "ts"];

/// Result of one full scan pass
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ScanSummary {
    pub files_seen: u64,
    pub new_items: u64,
    pub removed_items: u64,
    pub duration_ms: u64,
}

pub struct LibraryScanner {
    config: SharedConfig,
    wanted: WantedRepository,
    watched_folders: WatchedFolderRepository,
    events: std::sync::Arc<EventBus>,
    http_client: reqwest::Client,
}

impl LibraryScanner {
    pub fn new(
        config: SharedConfig,
        wanted: WantedRepository,
        watched_folders: WatchedFolderRepository,
        events: std::sync::Arc<EventBus>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            wanted,
            watched_folders,
            events,
            http_client,
        }
    }

    /// Run one full scan pass and publish `wanted_scan_complete`
    pub async fn scan(&self) -> Result<ScanSummary> {
        let started = std::time::Instant::now();
        let mut summary = ScanSummary::default();

        let (library_config, sonarr_config, radarr_config) = {
            let config = self.config.read().await;
            (
                config.library.clone(),
                config.sonarr.clone(),
                config.radarr.clone(),
            )
        };

        // Union of upstream libraries and watched folders
        let mut files: Vec<LibraryFile> = Vec::new();
        if sonarr_config.is_configured() {
            let client = SonarrClient::new(&sonarr_config, self.http_client.clone());
            match client.list_library_files().await {
                Ok(sonarr_files) => files.extend(sonarr_files),
                Err(e) => warn!("Sonarr library listing failed: {e}"),
            }
        }
        if radarr_config.is_configured() {
            let client = RadarrClient::new(&radarr_config, self.http_client.clone());
            match client.list_library_files().await {
                Ok(radarr_files) => files.extend(radarr_files),
                Err(e) => warn!("Radarr library listing failed: {e}"),
            }
        }
        match self.watched_folders.list_enabled().await {
            Ok(folders) => {
                for folder in folders {
                    let found = walk_folder(Path::new(&folder.path), folder.media_kind);
                    debug!("Watched folder {} yielded {} file(s)", folder.path, found.len());
                    files.extend(found);
                    let _ = self.watched_folders.touch_scanned(folder.id, Utc::now()).await;
                }
            }
            Err(e) => warn!("Watched folder listing failed: {e}"),
        }

        let languages = library_config.languages.clone();
        let kinds: Vec<SubtitleKind> = library_config
            .subtitle_kinds
            .iter()
            .filter_map(|k| k.parse().ok())
            .collect();

        let mut seen_paths: HashSet<String> = HashSet::new();
        let config_snapshot = self.config.read().await.clone();
        let prefer_ass = config_snapshot.upgrade.prefer_ass;

        for file in files {
            let local_path = config_snapshot.map_path(&file.path);
            if !Path::new(&local_path).exists() {
                debug!("Skipping missing media file: {local_path}");
                continue;
            }
            summary.files_seen += 1;
            seen_paths.insert(local_path.clone());

            for language in &languages {
                for kind in &kinds {
                    let request = if has_subtitle(&local_path, language, *kind) {
                        // Upgradable: an SRT on disk while ASS is preferred
                        match upgrade_candidate_score(&local_path, language, *kind, prefer_ass) {
                            Some(existing_score) => NewWantedItem {
                                kind: file.kind,
                                media_file_path: local_path.clone(),
                                target_language: language.clone(),
                                subtitle_kind: *kind,
                                upgrade_candidate: true,
                                current_score: existing_score,
                                series_id: file.series_id,
                                episode_id: file.episode_id,
                                movie_id: file.movie_id,
                                title: Some(file.title.clone()),
                            },
                            None => continue,
                        }
                    } else {
                        NewWantedItem {
                            kind: file.kind,
                            media_file_path: local_path.clone(),
                            target_language: language.clone(),
                            subtitle_kind: *kind,
                            upgrade_candidate: false,
                            current_score: 0,
                            series_id: file.series_id,
                            episode_id: file.episode_id,
                            movie_id: file.movie_id,
                            title: Some(file.title.clone()),
                        }
                    };

                    match self.wanted.upsert(&request).await {
                        Ok((_, created)) if created => summary.new_items += 1,
                        Ok(_) => {}
                        Err(e) => warn!("Wanted upsert failed for {local_path}: {e}"),
                    }
                }
            }
        }

        // Remove wanted rows whose media file disappeared
        match self.wanted.list_tracked_paths().await {
            Ok(tracked) => {
                let gone: Vec<String> = tracked
                    .into_iter()
                    .filter(|path| !seen_paths.contains(path) && !Path::new(path).exists())
                    .collect();
                if !gone.is_empty() {
                    match self.wanted.delete_by_paths(&gone).await {
                        Ok(removed) => summary.removed_items = removed,
                        Err(e) => warn!("Wanted cleanup failed: {e}"),
                    }
                }
            }
            Err(e) => warn!("Wanted path listing failed: {e}"),
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Library scan complete: {} file(s), {} new wanted, {} removed in {}ms",
            summary.files_seen, summary.new_items, summary.removed_items, summary.duration_ms
        );

        self.events.emit(
            EventKind::WantedScanComplete,
            event_payload! {
                "total_items" => summary.files_seen,
                "new_items" => summary.new_items,
                "removed_items" => summary.removed_items,
                "duration_ms" => summary.duration_ms,
            },
        );

        Ok(summary)
    }
}

/// Existing subtitle score when the install is upgradable under the
/// current policy, `None` when it should be left alone
fn upgrade_candidate_score(
    media_path: &str,
    language: &str,
    kind: SubtitleKind,
    prefer_ass: bool,
) -> Option<i32> {
    if !prefer_ass {
        return None;
    }
    let srt_path =
        crate::providers::aggregator::install_path(media_path, language, kind, SubtitleFormat::Srt);
    if !srt_path.exists() {
        return None;
    }
    score_existing_subtitle(&srt_path).map(|existing| existing.score)
}

/// Recursively collect media files under a watched folder
fn walk_folder(root: &Path, kind: MediaKind) -> Vec<LibraryFile> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_video = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if !is_video {
                continue;
            }
            let path_str = path.to_string_lossy().to_string();
            let tokens = parse_release_tokens(&path_str);
            // SxxEyy in the name overrides the folder's default kind
            let file_kind = if tokens.season.is_some() {
                MediaKind::Episode
            } else {
                kind
            };
            files.push(LibraryFile {
                kind: file_kind,
                path: path_str,
                title: tokens.title,
                series_id: None,
                episode_id: None,
                movie_id: None,
            });
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_walk_finds_nested_media() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Show Name/Season 01");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Show.Name.S01E01.mkv"), b"x").unwrap();
        std::fs::write(nested.join("cover.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("Movie.2020.mp4"), b"x").unwrap();

        let mut files = walk_folder(dir.path(), MediaKind::Movie);
        files.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(files.len(), 2);
        // The episode-numbered file is detected as an episode
        assert!(files.iter().any(|f| f.kind == MediaKind::Episode));
        assert!(files.iter().any(|f| f.kind == MediaKind::Movie));
    }
}
