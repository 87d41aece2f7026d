//! Jimaku provider: community subtitles for anime
//!
//! Two-step search: find the entry for a series title, then list its files
//! (optionally filtered to an episode). Files download directly from the
//! URL the API returns. ASS files dominate here, which is exactly what the
//! format bonus in scoring rewards.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{SearchQuery, SubtitleCandidate, SubtitleFormat};
use crate::providers::manifest::{ConfigFieldDescriptor, ConfigFieldKind, ProviderManifest};
use crate::providers::traits::SubtitleProvider;

use super::{check_status, transport_error};

pub const NAME: &str = "jimaku";

const API_BASE: &str = "https://jimaku.cc/api";

pub struct JimakuProvider {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    english_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntryFile {
    #[serde(default)]
    name: String,
    url: String,
}

impl JimakuProvider {
    pub fn new(settings: BTreeMap<String, String>, client: reqwest::Client) -> Self {
        Self {
            api_key: settings.get("api_key").cloned().unwrap_or_default(),
            client,
        }
    }

    fn auth_header(&self) -> ProviderResult<&str> {
        if self.api_key.is_empty() {
            return Err(ProviderError::AuthenticationFailed {
                provider: NAME.to_string(),
                message: "no API key configured".to_string(),
            });
        }
        Ok(&self.api_key)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> ProviderResult<T> {
        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header()?)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        let response = check_status(NAME, response)?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: NAME.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SubtitleProvider for JimakuProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn manifest(&self) -> ProviderManifest {
        ProviderManifest {
            name: NAME.to_string(),
            version: "1.0.0".to_string(),
            author: "Sublarr".to_string(),
            description: "Jimaku.cc anime subtitle index".to_string(),
            config_fields: vec![ConfigFieldDescriptor {
                key: "api_key".to_string(),
                label: "API Key".to_string(),
                kind: ConfigFieldKind::Password,
                required: true,
                default: None,
                help: Some("Account API key from jimaku.cc".to_string()),
            }],
            languages: vec!["ja".to_string(), "en".to_string()],
            requires_auth: true,
        }
    }

    async fn search(&self, query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>> {
        let title = query.series_title.as_deref().unwrap_or(&query.title);
        let entries: Vec<Entry> = self
            .get_json(format!(
                "{API_BASE}/entries/search?query={}",
                url::form_urlencoded::byte_serialize(title.as_bytes()).collect::<String>()
            ))
            .await?;

        // Take the best-titled entry; the API sorts by relevance
        let Some(entry) = entries.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut files_url = format!("{API_BASE}/entries/{}/files", entry.id);
        if let Some(episode) = query.episode {
            files_url.push_str(&format!("?episode={episode}"));
        }
        let files: Vec<EntryFile> = self.get_json(files_url).await?;

        let release_title = entry.english_name.unwrap_or(entry.name);
        let candidates = files
            .into_iter()
            .map(|file| SubtitleCandidate {
                provider_name: NAME.to_string(),
                external_id: format!("{}:{}", entry.id, file.name),
                language: query.language.clone(),
                format: format_from_name(&file.name),
                filename: file.name,
                release_info: release_title.clone(),
                download_url: Some(file.url),
                hearing_impaired: false,
                hash_match: false,
                metadata: BTreeMap::new(),
            })
            .collect();
        Ok(candidates)
    }

    async fn download(&self, candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>> {
        let url = candidate
            .download_url
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: NAME.to_string(),
                message: "candidate has no download URL".to_string(),
            })?;

        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header()?)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;
        let response = check_status(NAME, response)?;
        let bytes = response
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
        .unwrap_or(SubtitleFormat::Ass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_and_file_payloads_parse() {
        let entries: Vec<Entry> = serde_json::from_value(serde_json::json!([
            {"id": 77, "name": "Some Show", "english_name": "Some Show EN"}
        ]))
        .unwrap();
        assert_eq!(entries[0].id, 77);

        let files: Vec<EntryFile> = serde_json::from_value(serde_json::json!([
            {"name": "[Group] Some Show - 01.ass", "url": "https://jimaku.cc/f/1"}
        ]))
        .unwrap();
        assert_eq!(files[0].name, "[Group] Some Show - 01.ass");
    }

    #[test]
    fn download_requires_url() {
        let provider = JimakuProvider::new(
            BTreeMap::from([("api_key".to_string(), "k".to_string())]),
            reqwest::Client::new(),
        );
        let candidate = SubtitleCandidate {
            provider_name: NAME.to_string(),
            external_id: "77:file.ass".to_string(),
            language: "en".to_string(),
            format: SubtitleFormat::Ass,
            filename: "file.ass".to_string(),
            release_info: String::new(),
            download_url: None,
            hearing_impaired: false,
            hash_match: false,
            metadata: BTreeMap::new(),
        };
        let result = tokio_test::block_on(provider.download(&candidate));
        assert!(matches!(result, Err(ProviderError::InvalidResponse { .. })));
    }
}
