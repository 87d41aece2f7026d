//! OpenSubtitles provider (REST API v1)
//!
//! Searches `/subtitles` with the query fingerprint (title, season/episode,
//! year, content hash) and downloads through the two-step
//! `/download` → link flow. Requires an API key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{MediaKind, SearchQuery, SubtitleCandidate, SubtitleFormat};
use crate::providers::manifest::{ConfigFieldDescriptor, ConfigFieldKind, ProviderManifest};
use crate::providers::traits::SubtitleProvider;

use super::{check_status, transport_error};

pub const NAME: &str = "opensubtitles";

const API_BASE: &str = "https://api.opensubtitles.com/api/v1";

pub struct OpenSubtitlesProvider {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Deserialize, Default)]
struct Attributes {
    #[serde(default)]
    language: String,
    #[serde(default)]
    release: String,
    #[serde(default)]
    hearing_impaired: bool,
    #[serde(default)]
    foreign_parts_only: bool,
    #[serde(default)]
    moviehash_match: bool,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    file_id: i64,
    #[serde(default)]
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    link: String,
}

impl OpenSubtitlesProvider {
    pub fn new(settings: BTreeMap<String, String>, client: reqwest::Client) -> Self {
        Self {
            api_key: settings.get("api_key").cloned().unwrap_or_default(),
            client,
        }
    }

    fn require_api_key(&self) -> ProviderResult<&str> {
        if self.api_key.is_empty() {
            return Err(ProviderError::AuthenticationFailed {
                provider: NAME.to_string(),
                message: "no API key configured".to_string(),
            });
        }
        Ok(&self.api_key)
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn manifest(&self) -> ProviderManifest {
        ProviderManifest {
            name: NAME.to_string(),
            version: "1.0.0".to_string(),
            author: "Sublarr".to_string(),
            description: "OpenSubtitles.com REST API".to_string(),
            config_fields: vec![ConfigFieldDescriptor {
                key: "api_key".to_string(),
                label: "API Key".to_string(),
                kind: ConfigFieldKind::Password,
                required: true,
                default: None,
                help: Some("Consumer API key from opensubtitles.com".to_string()),
            }],
            languages: Vec::new(),
            requires_auth: true,
        }
    }

    async fn search(&self, query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>> {
        let api_key = self.require_api_key()?.to_string();

        let mut params: Vec<(&str, String)> = vec![("languages", query.language.clone())];
        match query.kind {
            Some(MediaKind::Episode) => {
                let title = query.series_title.as_deref().unwrap_or(&query.title);
                params.push(("query", title.to_string()));
                if let Some(season) = query.season {
                    params.push(("season_number", season.to_string()));
                }
                if let Some(episode) = query.episode {
                    params.push(("episode_number", episode.to_string()));
                }
            }
            _ => {
                params.push(("query", query.title.clone()));
                if let Some(year) = query.year {
                    params.push(("year", year.to_string()));
                }
            }
        }
        if let Some(hash) = &query.file_hash {
            params.push(("moviehash", hash.clone()));
        }

        let response = self
            .client
            .get(format!("{API_BASE}/subtitles"))
            .header("Api-Key", api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        let response = check_status(NAME, response)?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: NAME.to_string(),
                message: e.to_string(),
            })?;

        let mut candidates = Vec::new();
        for item in body.data {
            let attributes = item.attributes;
            // One candidate per file so multi-file releases stay selectable
            for file in &attributes.files {
                let mut metadata = BTreeMap::new();
                if attributes.foreign_parts_only {
                    metadata.insert("foreign_parts_only".to_string(), "true".to_string());
                }
                candidates.push(SubtitleCandidate {
                    provider_name: NAME.to_string(),
                    external_id: file.file_id.to_string(),
                    language: attributes.language.clone(),
                    format: format_from_name(&file.file_name),
                    filename: file.file_name.clone(),
                    release_info: attributes.release.clone(),
                    download_url: None,
                    hearing_impaired: attributes.hearing_impaired,
                    hash_match: attributes.moviehash_match,
                    metadata,
                });
            }
        }
        Ok(candidates)
    }

    async fn download(&self, candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>> {
        let api_key = self.require_api_key()?.to_string();

        let file_id: i64 =
            candidate
                .external_id
                .parse()
                .map_err(|_| ProviderError::InvalidResponse {
                    provider: NAME.to_string(),
                    message: format!("bad file id '{}'", candidate.external_id),
                })?;

        let response = self
            .client
            .post(format!("{API_BASE}/download"))
            .header("Api-Key", api_key)
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        let response = check_status(NAME, response)?;

        let body: DownloadResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: NAME.to_string(),
                    message: e.to_string(),
                })?;

        let content = self
            .client
            .get(&body.link)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        let content = check_status(NAME, content)?;
        let bytes = content
            .bytes()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        Ok(bytes.to_vec())
    }
}

fn format_from_name(filename: &str) -> SubtitleFormat {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(SubtitleFormat::parse)
        .unwrap_or(SubtitleFormat::Srt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_without_api_key_fails_with_auth_error() {
        let provider = OpenSubtitlesProvider::new(BTreeMap::new(), reqwest::Client::new());
        assert!(matches!(
            provider.require_api_key(),
            Err(ProviderError::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn manifest_declares_required_api_key() {
        let provider = OpenSubtitlesProvider::new(BTreeMap::new(), reqwest::Client::new());
        let manifest = provider.manifest();
        assert!(manifest.requires_auth);
        assert_eq!(manifest.config_fields[0].key, "api_key");
        assert_eq!(manifest.config_fields[0].kind, ConfigFieldKind::Password);
    }

    #[test]
    fn search_response_parses_nested_files() {
        let raw = serde_json::json!({
            "data": [{
                "id": "123",
                "attributes": {
                    "language": "de",
                    "release": "Show.S01E01.1080p.WEB",
                    "hearing_impaired": false,
                    "moviehash_match": true,
                    "files": [
                        {"file_id": 9001, "file_name": "Show.S01E01.de.srt"},
                        {"file_id": 9002, "file_name": "Show.S01E02.de.srt"}
                    ]
                }
            }]
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].attributes.files.len(), 2);
        assert!(parsed.data[0].attributes.moviehash_match);
    }
}
