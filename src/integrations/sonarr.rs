//! Sonarr API client (v3)

use serde::Deserialize;
use tracing::debug;

use crate::config::ArrConfig;
use crate::errors::{AppError, AppResult};
use crate::models::MediaKind;

use super::LibraryFile;

pub struct SonarrClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Series {
    id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeFile {
    id: i64,
    path: String,
}

impl SonarrClient {
    pub fn new(config: &ArrConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::external_service("sonarr", e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| AppError::external_service("sonarr", format!("invalid response: {e}")))
    }

    /// All episode files across every series
    pub async fn list_library_files(&self) -> AppResult<Vec<LibraryFile>> {
        let series: Vec<Series> = self.get_json("/api/v3/series").await?;
        debug!("Sonarr reports {} series", series.len());

        let mut files = Vec::new();
        for entry in series {
            let episode_files: Vec<EpisodeFile> = self
                .get_json(&format!("/api/v3/episodefile?seriesId={}", entry.id))
                .await?;
            for file in episode_files {
                files.push(LibraryFile {
                    kind: MediaKind::Episode,
                    path: file.path,
                    title: entry.title.clone(),
                    series_id: Some(entry.id),
                    episode_id: Some(file.id),
                    movie_id: None,
                });
            }
        }
        Ok(files)
    }

    /// Ask Sonarr to re-scan one series on disk
    pub async fn rescan_series(&self, series_id: i64) -> AppResult<()> {
        self.client
            .post(format!("{}/api/v3/command", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&serde_json::json!({ "name": "RescanSeries", "seriesId": series_id }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::external_service("sonarr", e.to_string()))?;
        Ok(())
    }
}
