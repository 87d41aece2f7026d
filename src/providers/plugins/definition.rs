//! Declarative plugin provider definitions
//!
//! A plugin is a TOML file in the plugin directory describing an HTTP JSON
//! subtitle API: a search request template, how to map response fields onto
//! candidates, and a download request template. The generic
//! [`HttpJsonProvider`] interprets the definition at call time, so plugin
//! authors ship a single self-contained file.
//!
//! Placeholders available in URLs and header values:
//! `{title}`, `{series_title}`, `{season}`, `{episode}`, `{year}`,
//! `{language}`, `{file_hash}`, `{external_id}` (download only) and
//! `{config:KEY}` for user-configured field values.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{SearchQuery, SubtitleCandidate, SubtitleFormat};
use crate::providers::manifest::{ConfigFieldDescriptor, ProviderManifest};
use crate::providers::traits::SubtitleProvider;

/// Parsed plugin definition file
#[derive(Debug, Clone, Deserialize)]
pub struct PluginDefinition {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub config_fields: Vec<ConfigFieldDescriptor>,
    pub search: SearchSpec,
    #[serde(default)]
    pub download: DownloadSpec,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSpec {
    pub url: String,
    /// Dotted path to the result array in the response (empty = root)
    #[serde(default)]
    pub results_path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Candidate field -> dotted path in each result object
    #[serde(default)]
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DownloadSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub id: String,
    pub filename: String,
    pub release: String,
    pub language: String,
    pub format: String,
    pub download_url: String,
    pub hearing_impaired: String,
    pub hash_match: String,
    pub foreign_parts_only: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            filename: "filename".to_string(),
            release: "release".to_string(),
            language: "language".to_string(),
            format: "format".to_string(),
            download_url: "download_url".to_string(),
            hearing_impaired: "hearing_impaired".to_string(),
            hash_match: "hash_match".to_string(),
            foreign_parts_only: "foreign_parts_only".to_string(),
        }
    }
}

/// Validate a parsed definition against the already-registered names.
///
/// Mirrors the loader contract: non-empty lowercase name with no collision,
/// a search capability, and a download capability (either a URL template or
/// a mapped per-candidate download URL).
pub fn validate_definition(
    definition: &PluginDefinition,
    existing_names: &[String],
) -> Result<(), String> {
    let name = definition.name.trim();
    if name.is_empty() || name == "unknown" {
        return Err("plugin has no usable 'name'".to_string());
    }
    if name != name.to_lowercase() {
        return Err(format!("plugin name '{name}' must be lowercase"));
    }
    if existing_names.iter().any(|n| n == name) {
        return Err(format!("name collision: '{name}' is already registered"));
    }
    if definition.search.url.trim().is_empty() {
        return Err("missing required 'search.url'".to_string());
    }
    if definition.download.url.trim().is_empty()
        && definition.search.fields.download_url.trim().is_empty()
    {
        return Err("no download capability: set 'download.url' or map 'fields.download_url'".to_string());
    }
    Ok(())
}

/// Generic provider interpreting a [`PluginDefinition`]
pub struct HttpJsonProvider {
    definition: PluginDefinition,
    /// User-configured values for the definition's config fields
    settings: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl HttpJsonProvider {
    pub fn new(
        definition: PluginDefinition,
        settings: BTreeMap<String, String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            definition,
            settings,
            client,
        }
    }

    fn err_invalid(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::InvalidResponse {
            provider: self.definition.name.clone(),
            message: message.into(),
        }
    }

    fn substitute(&self, template: &str, query: Option<&SearchQuery>, external_id: Option<&str>) -> String {
        let mut out = template.to_string();

        if let Some(query) = query {
            let series_title = query.series_title.as_deref().unwrap_or(&query.title);
            out = out
                .replace("{title}", &encode(&query.title))
                .replace("{series_title}", &encode(series_title))
                .replace("{season}", &opt_num(query.season))
                .replace("{episode}", &opt_num(query.episode))
                .replace("{year}", &opt_num(query.year))
                .replace("{language}", &encode(&query.language))
                .replace("{file_hash}", query.file_hash.as_deref().unwrap_or(""));
        }
        if let Some(id) = external_id {
            out = out.replace("{external_id}", &encode(id));
        }

        // {config:key} from user settings, falling back to field defaults
        while let Some(start) = out.find("{config:") {
            let Some(end) = out[start..].find('}') else {
                break;
            };
            let key = out[start + 8..start + end].to_string();
            let value = self
                .settings
                .get(&key)
                .cloned()
                .or_else(|| {
                    self.definition
                        .config_fields
                        .iter()
                        .find(|f| f.key == key)
                        .and_then(|f| f.default.clone())
                })
                .unwrap_or_default();
            out.replace_range(start..start + end + 1, &value);
        }

        out
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        query: Option<&SearchQuery>,
    ) -> ProviderResult<serde_json::Value> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, self.substitute(value, query, None));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: self.definition.name.clone(),
                }
            } else {
                ProviderError::Http {
                    provider: self.definition.name.clone(),
                    status: 0,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited {
                provider: self.definition.name.clone(),
                retry_after_secs,
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed {
                provider: self.definition.name.clone(),
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: self.definition.name.clone(),
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| self.err_invalid(format!("invalid JSON: {e}")))
    }
}

#[async_trait]
impl SubtitleProvider for HttpJsonProvider {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn manifest(&self) -> ProviderManifest {
        ProviderManifest {
            name: self.definition.name.clone(),
            version: self.definition.version.clone(),
            author: self.definition.author.clone(),
            description: self.definition.description.clone(),
            config_fields: self.definition.config_fields.clone(),
            languages: self.definition.languages.clone(),
            requires_auth: false,
        }
        .derive_requires_auth()
    }

    async fn search(&self, query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>> {
        let url = self.substitute(&self.definition.search.url, Some(query), None);
        let body = self
            .get_json(&url, &self.definition.search.headers, Some(query))
            .await?;

        let results = json_path(&body, &self.definition.search.results_path)
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                self.err_invalid(format!(
                    "no result array at '{}'",
                    self.definition.search.results_path
                ))
            })?;

        let fields = &self.definition.search.fields;
        let mut candidates = Vec::with_capacity(results.len());
        for item in results {
            let Some(external_id) = string_at(item, &fields.id) else {
                continue;
            };

            let filename = string_at(item, &fields.filename).unwrap_or_default();
            let format = string_at(item, &fields.format)
                .map(|f| SubtitleFormat::parse(&f))
                .unwrap_or_else(|| format_from_name(&filename));

            let mut metadata = BTreeMap::new();
            if let Some(value) = json_path(item, &fields.foreign_parts_only)
                && truthy(value)
            {
                metadata.insert("foreign_parts_only".to_string(), "true".to_string());
            }

            candidates.push(SubtitleCandidate {
                provider_name: self.definition.name.clone(),
                external_id,
                language: string_at(item, &fields.language)
                    .unwrap_or_else(|| query.language.clone()),
                format,
                filename,
                release_info: string_at(item, &fields.release).unwrap_or_default(),
                download_url: string_at(item, &fields.download_url),
                hearing_impaired: json_path(item, &fields.hearing_impaired)
                    .map(truthy)
                    .unwrap_or(false),
                hash_match: json_path(item, &fields.hash_match).map(truthy).unwrap_or(false),
                metadata,
            });
        }

        Ok(candidates)
    }

    async fn download(&self, candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>> {
        let url = match &candidate.download_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => {
                if self.definition.download.url.trim().is_empty() {
                    return Err(self.err_invalid("candidate has no download URL"));
                }
                self.substitute(
                    &self.definition.download.url,
                    None,
                    Some(&candidate.external_id),
                )
            }
        };

        let mut request = self.client.get(&url);
        for (key, value) in &self.definition.download.headers {
            request = request.header(key, self.substitute(value, None, None));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider: self.definition.name.clone(),
                status: 0,
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| ProviderError::Http {
                provider: self.definition.name.clone(),
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let bytes = response.bytes().await.map_err(|e| ProviderError::Http {
            provider: self.definition.name.clone(),
            status: 0,
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Navigate a dotted path through a JSON value; numeric segments index arrays
pub fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn string_at(value: &serde_json::Value, path: &str) -> Option<String> {
    match json_path(value, path)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        serde_json::Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

fn format_from_name(filename: &str) -> SubtitleFormat {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(SubtitleFormat::parse)
        .unwrap_or(SubtitleFormat::Unknown)
}

fn opt_num(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_definition(name: &str) -> PluginDefinition {
        toml::from_str(&format!(
            r#"
            name = "{name}"
            [search]
            url = "https://example.test/search?q={{title}}&lang={{language}}"
            [download]
            url = "https://example.test/download/{{external_id}}"
            "#
        ))
        .unwrap()
    }

    #[test]
    fn definition_parses_from_toml() {
        let def: PluginDefinition = toml::from_str(
            r#"
            name = "mysubs"
            version = "1.2.0"
            author = "someone"
            description = "A community subtitle API"
            languages = ["en", "de"]

            [[config_fields]]
            key = "api_key"
            label = "API Key"
            kind = "password"
            required = true

            [search]
            url = "https://api.mysubs.test/v1/search?q={title}"
            results_path = "data"
            [search.headers]
            X-Api-Key = "{config:api_key}"
            [search.fields]
            id = "attributes.id"
            filename = "attributes.file_name"

            [download]
            url = "https://api.mysubs.test/v1/download/{external_id}"
            "#,
        )
        .unwrap();

        assert_eq!(def.name, "mysubs");
        assert_eq!(def.config_fields.len(), 1);
        assert_eq!(def.search.fields.id, "attributes.id");
        // Unmapped fields keep their defaults
        assert_eq!(def.search.fields.release, "release");
    }

    #[test]
    fn validation_rejects_bad_definitions() {
        let mut def = minimal_definition("good");
        assert!(validate_definition(&def, &[]).is_ok());

        def.name = "".to_string();
        assert!(validate_definition(&def, &[]).is_err());

        def.name = "Mixed".to_string();
        assert!(validate_definition(&def, &[]).is_err());

        def.name = "taken".to_string();
        assert!(validate_definition(&def, &["taken".to_string()]).is_err());

        def.name = "nodownload".to_string();
        def.download.url = String::new();
        def.search.fields.download_url = String::new();
        assert!(validate_definition(&def, &[]).is_err());
    }

    #[test]
    fn substitution_fills_query_and_config_values() {
        let mut def = minimal_definition("subs");
        def.config_fields.push(ConfigFieldDescriptor {
            key: "api_key".to_string(),
            label: "API Key".to_string(),
            default: Some("default-key".to_string()),
            ..Default::default()
        });
        let provider = HttpJsonProvider::new(
            def,
            BTreeMap::from([("api_key".to_string(), "user-key".to_string())]),
            reqwest::Client::new(),
        );

        let query = SearchQuery {
            title: "Show Name".to_string(),
            season: Some(2),
            episode: Some(5),
            language: "de".to_string(),
            ..Default::default()
        };

        let out = provider.substitute(
            "https://x/search?q={title}&s={season}&e={episode}&l={language}&k={config:api_key}",
            Some(&query),
            None,
        );
        assert_eq!(
            out,
            "https://x/search?q=Show+Name&s=2&e=5&l=de&k=user-key"
        );

        // Missing setting falls back to the declared default
        let provider_no_setting = HttpJsonProvider::new(
            minimal_definition_with_default(),
            BTreeMap::new(),
            reqwest::Client::new(),
        );
        let out = provider_no_setting.substitute("{config:api_key}", None, None);
        assert_eq!(out, "default-key");
    }

    fn minimal_definition_with_default() -> PluginDefinition {
        let mut def = minimal_definition("withdefault");
        def.config_fields.push(ConfigFieldDescriptor {
            key: "api_key".to_string(),
            label: "API Key".to_string(),
            default: Some("default-key".to_string()),
            ..Default::default()
        });
        def
    }

    #[test]
    fn json_path_navigates_objects_and_arrays() {
        let value = serde_json::json!({
            "data": [{"attributes": {"id": 42, "files": [{"name": "a.ass"}]}}]
        });
        assert_eq!(
            json_path(&value, "data.0.attributes.id").unwrap(),
            &serde_json::json!(42)
        );
        assert_eq!(
            json_path(&value, "data.0.attributes.files.0.name").unwrap(),
            &serde_json::json!("a.ass")
        );
        assert!(json_path(&value, "data.1").is_none());
        assert!(json_path(&value, "missing").is_none());
    }
}
