//! Local translation pipeline client
//!
//! Thin HTTP client for the configured speech-to-text / LLM translation
//! sidecar. Model execution and translation internals live entirely in the
//! sidecar; this client only submits a media file and waits for the
//! produced subtitle path.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::config::TranslateConfig;
use crate::errors::{AppError, AppResult};

pub struct TranslateClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    output_path: String,
    #[serde(default)]
    detected_language: Option<String>,
}

impl TranslateClient {
    pub fn new(config: &TranslateConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            client,
        }
    }

    /// Produce a subtitle for `media_file_path` in `target_language` via
    /// the local pipeline. Returns the path of the written subtitle.
    pub async fn generate_subtitle(
        &self,
        media_file_path: &str,
        target_language: &str,
    ) -> AppResult<String> {
        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "file_path": media_file_path,
                "target_language": target_language,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::external_service("translate", e.to_string()))?;

        let body: TranslateResponse = response.json().await.map_err(|e| {
            AppError::external_service("translate", format!("invalid response: {e}"))
        })?;

        info!(
            "Local pipeline produced {} (detected language: {})",
            body.output_path,
            body.detected_language.as_deref().unwrap_or("unknown")
        );
        Ok(body.output_path)
    }
}
