use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub mod defaults;

use defaults::*;

/// Environment variable prefix for all settings (`SUBLARR_WEB__PORT=8989`)
pub const ENV_PREFIX: &str = "SUBLARR_";

/// Settings shared across tasks; replaced in place on config updates
pub type SharedConfig = std::sync::Arc<tokio::sync::RwLock<Config>>;

/// Placeholder returned instead of secret values by the settings endpoint.
/// Writes carrying this placeholder are ignored so a round-tripped config
/// cannot clobber stored secrets.
pub const SECRET_MASK: &str = "***configured***";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub library: LibraryConfig,
    pub search: SearchConfig,
    pub upgrade: UpgradeConfig,
    pub webhook: WebhookConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub plugins: PluginsConfig,
    pub providers: ProvidersConfig,
    pub sonarr: ArrConfig,
    pub radarr: ArrConfig,
    pub translate: TranslateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            library: LibraryConfig::default(),
            search: SearchConfig::default(),
            upgrade: UpgradeConfig::default(),
            webhook: WebhookConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            plugins: PluginsConfig::default(),
            providers: ProvidersConfig::default(),
            sonarr: ArrConfig::default(),
            radarr: ArrConfig::default(),
            translate: TranslateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub user_agent: String,
    /// Optional API key; when set every /api route requires `X-Api-Key`
    pub api_key: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            api_key: None,
        }
    }
}

/// A Sonarr/Radarr-side path prefix mapped onto a local mount point
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathMapping {
    pub remote: String,
    pub local: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Target subtitle languages (ISO 639-1)
    pub languages: Vec<String>,
    /// Subtitle kinds tracked per language: full, forced, signs
    pub subtitle_kinds: Vec<String>,
    /// Periodic library scan cadence
    pub scan_interval_seconds: u64,
    pub path_mappings: Vec<PathMapping>,
    /// Minimum free space required on the destination volume before installs
    pub min_free_disk_mb: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            subtitle_kinds: default_subtitle_kinds(),
            scan_interval_seconds: default_scan_interval_seconds(),
            path_mappings: Vec::new(),
            min_free_disk_mb: default_min_free_disk_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Processing loop tick
    pub interval_seconds: u64,
    /// Global bound on concurrent wanted-item searches
    pub concurrency: usize,
    /// How many due items one tick pulls
    pub batch_size: u64,
    pub provider_search_timeout_seconds: u64,
    pub provider_download_timeout_seconds: u64,
    /// Candidates below this effective score yield no-result
    pub min_score: i32,
    /// Per-language overrides of `min_score`
    pub min_score_per_language: BTreeMap<String, i32>,
    pub retry_backoff_base_seconds: u64,
    pub retry_backoff_cap_seconds: u64,
    /// Stuck `searching` rows older than timeout + grace revert to `wanted`
    pub searching_grace_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_search_interval_seconds(),
            concurrency: default_search_concurrency(),
            batch_size: default_search_batch_size(),
            provider_search_timeout_seconds: default_provider_search_timeout_seconds(),
            provider_download_timeout_seconds: default_provider_download_timeout_seconds(),
            min_score: default_min_score(),
            min_score_per_language: BTreeMap::new(),
            retry_backoff_base_seconds: default_retry_backoff_base_seconds(),
            retry_backoff_cap_seconds: default_retry_backoff_cap_seconds(),
            searching_grace_seconds: default_searching_grace_seconds(),
        }
    }
}

impl SearchConfig {
    /// Minimum acceptable score for a language, falling back to the global floor
    pub fn min_score_for(&self, language: &str) -> i32 {
        self.min_score_per_language
            .get(language)
            .copied()
            .unwrap_or(self.min_score)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    pub min_score_delta: i32,
    pub window_days: i64,
    pub prefer_ass: bool,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            min_score_delta: default_upgrade_min_score_delta(),
            window_days: default_upgrade_window_days(),
            prefer_ass: default_upgrade_prefer_ass(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub delay_minutes: u64,
    pub auto_scan: bool,
    pub auto_search: bool,
    pub auto_translate: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            delay_minutes: default_webhook_delay_minutes(),
            auto_scan: default_true(),
            auto_search: default_true(),
            auto_translate: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_circuit_breaker_failures(),
            cooldown_seconds: default_circuit_breaker_cooldown_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection URL; empty means use the in-process backend
    pub redis_url: String,
    /// Default TTL for cached provider search responses
    pub response_cache_ttl_seconds: u64,
    /// Per-provider TTL overrides
    pub provider_ttl_seconds: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: String::new(),
            response_cache_ttl_seconds: default_response_cache_ttl_seconds(),
            provider_ttl_seconds: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for_provider(&self, provider: &str) -> u64 {
        self.provider_ttl_seconds
            .get(provider)
            .copied()
            .unwrap_or(self.response_cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub dir: PathBuf,
    /// Watch the plugin directory and hot-reload on change
    pub watch: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugins_dir(),
            watch: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Providers allowed to serve searches; empty means all registered
    pub enabled: Vec<String>,
    /// Tie-break ordering for best-selection (earlier wins)
    pub preference_order: Vec<String>,
    /// Per-provider config field values keyed by provider name
    pub settings: BTreeMap<String, BTreeMap<String, String>>,
}

impl ProvidersConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|n| n == name)
    }

    /// Position in the preference order; unlisted providers sort last
    pub fn preference_rank(&self, name: &str) -> usize {
        self.preference_order
            .iter()
            .position(|n| n == name)
            .unwrap_or(usize::MAX)
    }

    pub fn provider_setting(&self, provider: &str, key: &str) -> Option<&str> {
        self.settings
            .get(provider)
            .and_then(|fields| fields.get(key))
            .map(String::as_str)
    }
}

/// Connection settings for an upstream media manager (Sonarr or Radarr)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArrConfig {
    pub url: String,
    pub api_key: String,
}

impl ArrConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of the local speech-to-text / translation sidecar
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: default_translate_timeout_seconds(),
        }
    }
}

impl TranslateConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

impl Config {
    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings from the TOML file (if present) and environment
    pub fn load(path: &Path) -> Result<Self> {
        Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Load settings with database overrides applied on top of file/env.
    ///
    /// Override keys are dotted paths into this struct
    /// (e.g. `webhook.delay_minutes`). Values are stored as strings and
    /// coerced to bool/int/float where they parse as such.
    pub fn load_with_overrides(path: &Path, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut figment = Self::figment(path);
        for (key, value) in overrides {
            figment = figment.merge(Serialized::default(key, coerce_override(value)));
        }
        figment
            .extract()
            .context("Failed to apply configuration overrides from database")
    }

    /// Map an upstream manager path onto the local filesystem
    pub fn map_path(&self, remote_path: &str) -> String {
        for mapping in &self.library.path_mappings {
            if let Some(rest) = remote_path.strip_prefix(&mapping.remote) {
                return format!("{}{}", mapping.local, rest);
            }
        }
        remote_path.to_string()
    }

    /// Serialized settings with every secret replaced by [`SECRET_MASK`]
    pub fn safe_view(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        mask_secrets(&mut value);
        value
    }
}

/// Coerce a stored string override into the most specific JSON value
fn coerce_override(raw: &str) -> serde_json::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    serde_json::Value::String(raw.to_string())
}

/// Whether a settings key holds a secret that must never leave the process
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("api_key") || key.contains("password") || key.contains("token")
}

fn mask_secrets(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        for (key, entry) in map.iter_mut() {
            match entry {
                serde_json::Value::String(s) if is_secret_key(key) && !s.is_empty() => {
                    *entry = serde_json::Value::String(SECRET_MASK.to_string());
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => mask_secrets(entry),
                _ => {}
            }
        }
    } else if let serde_json::Value::Array(items) = value {
        for item in items {
            mask_secrets(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.web.port, 8989);
        assert_eq!(config.search.retry_backoff_base_seconds, 900);
        assert!(config.upgrade.prefer_ass);
        assert_eq!(config.library.min_free_disk_mb, 100);
    }

    #[test]
    fn overrides_coerce_types() {
        assert_eq!(coerce_override("true"), serde_json::Value::Bool(true));
        assert_eq!(coerce_override("42"), serde_json::Value::from(42));
        assert_eq!(
            coerce_override("de"),
            serde_json::Value::String("de".to_string())
        );
    }

    #[test]
    fn db_overrides_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[webhook]\ndelay_minutes = 5\n").unwrap();

        let mut overrides = BTreeMap::new();
        overrides.insert("webhook.delay_minutes".to_string(), "10".to_string());
        overrides.insert("upgrade.prefer_ass".to_string(), "false".to_string());

        let config = Config::load_with_overrides(&path, &overrides).unwrap();
        assert_eq!(config.webhook.delay_minutes, 10);
        assert!(!config.upgrade.prefer_ass);
    }

    #[test]
    fn safe_view_masks_secrets() {
        let mut config = Config::default();
        config.sonarr.api_key = "super-secret".to_string();
        config.web.api_key = Some("another".to_string());

        let view = config.safe_view();
        assert_eq!(view["sonarr"]["api_key"], SECRET_MASK);
        assert_eq!(view["web"]["api_key"], SECRET_MASK);
        // Non-secret values pass through untouched
        assert_eq!(view["web"]["port"], 8989);
    }

    #[test]
    fn path_mapping_rewrites_prefix() {
        let mut config = Config::default();
        config.library.path_mappings.push(PathMapping {
            remote: "/tv".to_string(),
            local: "/mnt/media/tv".to_string(),
        });
        assert_eq!(
            config.map_path("/tv/Show/S01E01.mkv"),
            "/mnt/media/tv/Show/S01E01.mkv"
        );
        assert_eq!(config.map_path("/movies/X.mkv"), "/movies/X.mkv");
    }

    #[test]
    fn min_score_language_override() {
        let mut config = Config::default();
        config
            .search
            .min_score_per_language
            .insert("de".to_string(), 120);
        assert_eq!(config.search.min_score_for("de"), 120);
        assert_eq!(config.search.min_score_for("en"), config.search.min_score);
    }
}
