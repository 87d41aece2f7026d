//! Radarr API client (v3)

use serde::Deserialize;
use tracing::debug;

use crate::config::ArrConfig;
use crate::errors::{AppError, AppResult};
use crate::models::MediaKind;

use super::LibraryFile;

pub struct RadarrClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Movie {
    id: i64,
    title: String,
    #[serde(default)]
    has_file: bool,
    movie_file: Option<MovieFile>,
}

#[derive(Debug, Deserialize)]
struct MovieFile {
    path: String,
}

impl RadarrClient {
    pub fn new(config: &ArrConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// All movies that have a file on disk
    pub async fn list_library_files(&self) -> AppResult<Vec<LibraryFile>> {
        let response = self
            .client
            .get(format!("{}/api/v3/movie", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::external_service("radarr", e.to_string()))?;
        let movies: Vec<Movie> = response
            .json()
            .await
            .map_err(|e| AppError::external_service("radarr", format!("invalid response: {e}")))?;
        debug!("Radarr reports {} movies", movies.len());

        Ok(movies
            .into_iter()
            .filter(|m| m.has_file)
            .filter_map(|m| {
                let file = m.movie_file?;
                Some(LibraryFile {
                    kind: MediaKind::Movie,
                    path: file.path,
                    title: m.title,
                    series_id: None,
                    episode_id: None,
                    movie_id: Some(m.id),
                })
            })
            .collect())
    }

    /// Ask Radarr to re-scan one movie on disk
    pub async fn rescan_movie(&self, movie_id: i64) -> AppResult<()> {
        self.client
            .post(format!("{}/api/v3/command", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&serde_json::json!({ "name": "RescanMovie", "movieId": movie_id }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::external_service("radarr", e.to_string()))?;
        Ok(())
    }
}
