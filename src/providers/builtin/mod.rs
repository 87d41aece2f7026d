//! Compiled-in subtitle providers
//!
//! Built-ins self-register at process init via [`create_builtin_providers`].
//! Each provider reads its credentials from the per-provider settings map
//! in the configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{ProviderError, ProviderResult};
use crate::providers::traits::SubtitleProvider;

pub mod jimaku;
pub mod opensubtitles;

pub use jimaku::JimakuProvider;
pub use opensubtitles::OpenSubtitlesProvider;

/// Instantiate every compiled-in provider
pub fn create_builtin_providers(
    provider_settings: &BTreeMap<String, BTreeMap<String, String>>,
    client: reqwest::Client,
) -> Vec<Arc<dyn SubtitleProvider>> {
    let settings_for = |name: &str| provider_settings.get(name).cloned().unwrap_or_default();

    vec![
        Arc::new(OpenSubtitlesProvider::new(
            settings_for(opensubtitles::NAME),
            client.clone(),
        )) as Arc<dyn SubtitleProvider>,
        Arc::new(JimakuProvider::new(settings_for(jimaku::NAME), client)) as Arc<dyn SubtitleProvider>,
    ]
}

/// Map an HTTP response status onto the provider error taxonomy.
///
/// 429 carries the server's Retry-After hint when present; 401/403 become
/// authentication failures; other non-success statuses become plain HTTP
/// errors.
pub(crate) fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.as_u16() == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ProviderError::RateLimited {
            provider: provider.to_string(),
            retry_after_secs,
        });
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ProviderError::AuthenticationFailed {
            provider: provider.to_string(),
            message: format!("HTTP {status}"),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: status.to_string(),
        });
    }
    Ok(response)
}

/// Wrap a transport error, distinguishing timeouts
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        ProviderError::Http {
            provider: provider.to_string(),
            status: 0,
            message: error.to_string(),
        }
    }
}
