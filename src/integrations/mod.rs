//! Upstream media manager clients
//!
//! Thin typed clients for Sonarr and Radarr: enumerate library files for
//! the periodic scan and trigger re-scans from the webhook pipeline. Only
//! the endpoints the core needs are wrapped.

use crate::models::MediaKind;

pub mod radarr;
pub mod sonarr;

pub use radarr::RadarrClient;
pub use sonarr::SonarrClient;

/// One media file known to an upstream manager (or a watched folder)
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryFile {
    pub kind: MediaKind,
    pub path: String,
    pub title: String,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub movie_id: Option<i64>,
}
