//! Domain model types
//!
//! Plain data types shared across repositories, services and the web layer.
//! Database entities (SeaORM) live in `crate::entities` and are converted to
//! these types at the repository boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Kind of media a wanted item refers to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Episode,
    Movie,
}

/// Subtitle track kind
///
/// `Forced` carries translations of foreign-language dialogue only; `Signs`
/// carries on-screen text and songs (common in fansubbed anime releases).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubtitleKind {
    Full,
    Forced,
    Signs,
}

impl SubtitleKind {
    /// File name infix used when installing (`full` gets none)
    pub fn path_infix(&self) -> Option<&'static str> {
        match self {
            SubtitleKind::Full => None,
            SubtitleKind::Forced => Some("forced"),
            SubtitleKind::Signs => Some("signs"),
        }
    }
}

/// Lifecycle state of a wanted item
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WantedStatus {
    Wanted,
    Searching,
    Failed,
    Done,
    Blacklisted,
}

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Ass,
    Ssa,
    Srt,
    Vtt,
    Unknown,
}

impl SubtitleFormat {
    /// Parse from a file extension or format label (case-insensitive)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ass" => SubtitleFormat::Ass,
            "ssa" => SubtitleFormat::Ssa,
            "srt" => SubtitleFormat::Srt,
            "vtt" => SubtitleFormat::Vtt,
            _ => SubtitleFormat::Unknown,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Ass => "ass",
            SubtitleFormat::Ssa => "ssa",
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Unknown => "sub",
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where an installed subtitle came from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DownloadSource {
    Provider,
    LocalStt,
}

/// A persistent record that a media file needs a subtitle
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WantedItem {
    pub id: i64,
    pub kind: MediaKind,
    pub media_file_path: String,
    pub target_language: String,
    pub subtitle_kind: SubtitleKind,
    pub status: WantedStatus,
    pub search_count: i32,
    pub last_search_at: Option<DateTime<Utc>>,
    pub retry_after: Option<DateTime<Utc>>,
    pub current_score: i32,
    pub upgrade_candidate: bool,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert request for a wanted item
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewWantedItem {
    pub kind: MediaKind,
    pub media_file_path: String,
    pub target_language: String,
    pub subtitle_kind: SubtitleKind,
    #[serde(default)]
    pub upgrade_candidate: bool,
    #[serde(default)]
    pub current_score: i32,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub title: Option<String>,
}

/// Record of a successfully installed subtitle
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubtitleDownload {
    pub id: i64,
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub format: SubtitleFormat,
    pub installed_path: String,
    pub score: i32,
    pub subtitle_kind: SubtitleKind,
    pub source: DownloadSource,
    pub downloaded_at: DateTime<Utc>,
}

/// Append-only record of a subtitle replacement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpgradeRecord {
    pub id: i64,
    pub media_file_path: String,
    pub old_format: SubtitleFormat,
    pub old_score: i32,
    pub new_format: SubtitleFormat,
    pub new_score: i32,
    pub provider_name: String,
    pub reason: String,
    pub upgraded_at: DateTime<Utc>,
}

/// A release blocked from ever being downloaded again
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlacklistEntry {
    pub id: i64,
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub media_file_path: String,
    pub title: Option<String>,
    pub reason: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Request body for adding a blacklist entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewBlacklistEntry {
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub media_file_path: String,
    pub title: Option<String>,
    pub reason: Option<String>,
}

/// Per-provider reliability and performance statistics
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderStatistics {
    pub provider_name: String,
    pub total_searches: i64,
    pub successes: i64,
    pub failures: i64,
    pub avg_score: f64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub avg_response_time_ms: f64,
    pub auto_disabled: bool,
    pub disabled_until: Option<DateTime<Utc>>,
}

impl ProviderStatistics {
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            total_searches: 0,
            successes: 0,
            failures: 0,
            avg_score: 0.0,
            last_success_at: None,
            last_failure_at: None,
            consecutive_failures: 0,
            avg_response_time_ms: 0.0,
            auto_disabled: false,
            disabled_until: None,
        }
    }
}

/// A folder scanned for media files outside the upstream managers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WatchedFolder {
    pub id: i64,
    pub path: String,
    pub label: Option<String>,
    pub media_kind: MediaKind,
    pub enabled: bool,
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// Query fingerprint derived from a media file for provider searches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub kind: Option<MediaKind>,
    pub media_file_path: String,
    pub title: String,
    pub series_title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
    pub language: String,
    pub subtitle_kind: Option<SubtitleKind>,
    /// OSDb-style content hash of the media file, when computable
    pub file_hash: Option<String>,
    pub release_group: Option<String>,
    pub source: Option<String>,
    pub resolution: Option<String>,
    pub audio_codec: Option<String>,
}

/// One subtitle offered by a provider search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub format: SubtitleFormat,
    pub filename: String,
    pub release_info: String,
    /// Direct download URL when the provider exposes one
    pub download_url: Option<String>,
    pub hearing_impaired: bool,
    /// True when the provider flagged the subtitle hash-matched to the file
    pub hash_match: bool,
    /// Provider-specific extras consulted by detection (e.g. foreign_parts_only)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A candidate after scoring and kind-detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: SubtitleCandidate,
    pub raw_score: i32,
    /// Raw score plus the per-provider user modifier
    pub effective_score: i32,
    pub detected_kind: SubtitleKind,
    pub detection_confidence: f64,
    /// Latency of the originating provider search
    pub search_latency_ms: u64,
}

/// Counts of wanted items per status, for dashboards and `/wanted/stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WantedStats {
    pub wanted: u64,
    pub searching: u64,
    pub failed: u64,
    pub done: u64,
    pub blacklisted: u64,
}

impl WantedStats {
    pub fn total(&self) -> u64 {
        self.wanted + self.searching + self.failed + self.done + self.blacklisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enums_round_trip_through_strings() {
        assert_eq!(MediaKind::from_str("episode").unwrap(), MediaKind::Episode);
        assert_eq!(MediaKind::Movie.to_string(), "movie");
        assert_eq!(
            WantedStatus::from_str("searching").unwrap(),
            WantedStatus::Searching
        );
        assert_eq!(SubtitleKind::Signs.to_string(), "signs");
        assert_eq!(DownloadSource::LocalStt.to_string(), "local_stt");
    }

    #[test]
    fn subtitle_format_parses_extensions() {
        assert_eq!(SubtitleFormat::parse("ASS"), SubtitleFormat::Ass);
        assert_eq!(SubtitleFormat::parse(".srt"), SubtitleFormat::Srt);
        assert_eq!(SubtitleFormat::parse("sup"), SubtitleFormat::Unknown);
        assert_eq!(SubtitleFormat::Vtt.extension(), "vtt");
    }

    #[test]
    fn kind_infix_only_for_non_full() {
        assert_eq!(SubtitleKind::Full.path_infix(), None);
        assert_eq!(SubtitleKind::Forced.path_infix(), Some("forced"));
    }
}
