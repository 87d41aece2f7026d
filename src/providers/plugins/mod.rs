//! Plugin discovery and lifecycle
//!
//! Scans the plugin directory for `*.toml` provider definitions, validates
//! each file in isolation and swaps the registry's plugin set atomically.
//! Bad files are recorded per-file and never abort the scan. Plugins run
//! in-process with full trust; validation catches accidental errors only.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::SharedConfig;
use crate::events::{EventBus, EventKind};
use crate::providers::registry::ProviderRegistry;
use crate::providers::traits::SubtitleProvider;

pub mod definition;
pub mod watcher;

pub use definition::{HttpJsonProvider, PluginDefinition, validate_definition};

/// A per-file validation or parse failure from the last scan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PluginLoadError {
    pub file: String,
    pub error: String,
}

pub struct PluginManager {
    plugins_dir: PathBuf,
    registry: Arc<ProviderRegistry>,
    config: SharedConfig,
    client: reqwest::Client,
    events: Arc<EventBus>,
    loaded: RwLock<Vec<String>>,
    last_errors: RwLock<Vec<PluginLoadError>>,
}

impl PluginManager {
    pub fn new(
        plugins_dir: PathBuf,
        registry: Arc<ProviderRegistry>,
        config: SharedConfig,
        client: reqwest::Client,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            plugins_dir,
            registry,
            config,
            client,
            events,
            loaded: RwLock::new(Vec::new()),
            last_errors: RwLock::new(Vec::new()),
        }
    }

    pub fn plugins_dir(&self) -> &PathBuf {
        &self.plugins_dir
    }

    /// Names loaded by the most recent scan
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.read().expect("plugin lock poisoned").clone()
    }

    /// Per-file errors from the most recent scan
    pub fn errors(&self) -> Vec<PluginLoadError> {
        self.last_errors
            .read()
            .expect("plugin lock poisoned")
            .clone()
    }

    /// Discover definitions and atomically swap the registry's plugin set.
    ///
    /// Readers of the registry never see a partial set: the new providers
    /// are fully built before the single swap. Returns the loaded names and
    /// the per-file errors.
    pub async fn reload(&self) -> (Vec<String>, Vec<PluginLoadError>) {
        let (definitions, mut errors) = self.discover();

        let provider_settings = {
            let config = self.config.read().await;
            config.providers.settings.clone()
        };

        let mut providers: Vec<Arc<dyn SubtitleProvider>> = Vec::new();
        let mut loaded: Vec<String> = Vec::new();
        for definition in definitions {
            let settings = provider_settings
                .get(&definition.name)
                .cloned()
                .unwrap_or_default();
            loaded.push(definition.name.clone());
            providers.push(Arc::new(HttpJsonProvider::new(
                definition,
                settings,
                self.client.clone(),
            )));
        }

        self.registry.swap_plugins(providers);

        loaded.sort();
        errors.sort_by(|a, b| a.file.cmp(&b.file));
        *self.loaded.write().expect("plugin lock poisoned") = loaded.clone();
        *self.last_errors.write().expect("plugin lock poisoned") = errors.clone();

        if !loaded.is_empty() {
            info!("Loaded {} plugin provider(s): {:?}", loaded.len(), loaded);
        } else {
            debug!("No plugin providers loaded from {}", self.plugins_dir.display());
        }
        for error in &errors {
            warn!("Plugin '{}' skipped: {}", error.file, error.error);
        }

        self.events.emit(
            EventKind::PluginsReloaded,
            crate::event_payload! {
                "loaded" => loaded.len(),
                "errors" => errors.len(),
            },
        );

        (loaded, errors)
    }

    /// Scan the plugin directory for definition files
    fn discover(&self) -> (Vec<PluginDefinition>, Vec<PluginLoadError>) {
        let mut definitions: Vec<PluginDefinition> = Vec::new();
        let mut errors: Vec<PluginLoadError> = Vec::new();

        let entries = match std::fs::read_dir(&self.plugins_dir) {
            Ok(entries) => entries,
            Err(_) => {
                debug!(
                    "Plugins directory does not exist: {}",
                    self.plugins_dir.display()
                );
                return (definitions, errors);
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_plugin_file(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return (definitions, errors);
        }
        info!(
            "Scanning {} plugin file(s) in {}",
            files.len(),
            self.plugins_dir.display()
        );

        let builtin_names = self.registry.builtin_names();
        for path in files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    errors.push(PluginLoadError {
                        file: file_name,
                        error: format!("unreadable: {e}"),
                    });
                    continue;
                }
            };

            let definition: PluginDefinition = match toml::from_str(&raw) {
                Ok(definition) => definition,
                Err(e) => {
                    errors.push(PluginLoadError {
                        file: file_name,
                        error: format!("parse error: {e}"),
                    });
                    continue;
                }
            };

            // Collision set: built-ins plus what this scan already accepted
            let mut existing = builtin_names.clone();
            existing.extend(definitions.iter().map(|d| d.name.clone()));
            if let Err(reason) = validate_definition(&definition, &existing) {
                errors.push(PluginLoadError {
                    file: file_name,
                    error: reason,
                });
                continue;
            }

            info!(
                "Discovered plugin provider: {} from {}",
                definition.name, file_name
            );
            definitions.push(definition);
        }

        (definitions, errors)
    }
}

/// Plugin files are visible `.toml` files not starting with `_`
fn is_plugin_file(path: &std::path::Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
        return false;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('_') && !name.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn write_plugin(dir: &std::path::Path, file: &str, name: &str) {
        std::fs::write(
            dir.join(file),
            format!(
                r#"
                name = "{name}"
                [search]
                url = "https://example.test/search?q={{title}}"
                [download]
                url = "https://example.test/dl/{{external_id}}"
                "#
            ),
        )
        .unwrap();
    }

    fn manager_for(dir: &std::path::Path) -> PluginManager {
        let registry = Arc::new(ProviderRegistry::new(Vec::new()).unwrap());
        PluginManager::new(
            dir.to_path_buf(),
            registry,
            Arc::new(tokio::sync::RwLock::new(Config::default())),
            reqwest::Client::new(),
            Arc::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn reload_loads_valid_and_records_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "good.toml", "goodsubs");
        std::fs::write(dir.path().join("broken.toml"), "not [valid toml").unwrap();
        // Hidden and non-toml files are ignored entirely
        write_plugin(dir.path(), "_disabled.toml", "disabled");
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let manager = manager_for(dir.path());
        let (loaded, errors) = manager.reload().await;

        assert_eq!(loaded, vec!["goodsubs"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "broken.toml");
        assert!(manager.registry.get("goodsubs").is_some());
    }

    #[tokio::test]
    async fn duplicate_names_within_scan_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "a.toml", "dupsubs");
        write_plugin(dir.path(), "b.toml", "dupsubs");

        let manager = manager_for(dir.path());
        let (loaded, errors) = manager.reload().await;

        // Files scan in sorted order, so a.toml wins
        assert_eq!(loaded, vec!["dupsubs"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "b.toml");
    }

    #[tokio::test]
    async fn reload_with_unchanged_directory_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "one.toml", "onesubs");

        let manager = manager_for(dir.path());
        let first = manager.reload().await;
        let second = manager.reload().await;

        assert_eq!(first.0, second.0);
        assert_eq!(manager.registry.names(), vec!["onesubs"]);
    }

    #[tokio::test]
    async fn removing_a_file_unloads_the_plugin() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "gone.toml", "gonesubs");

        let manager = manager_for(dir.path());
        manager.reload().await;
        assert!(manager.registry.get("gonesubs").is_some());

        std::fs::remove_file(dir.path().join("gone.toml")).unwrap();
        manager.reload().await;
        assert!(manager.registry.get("gonesubs").is_none());
        assert!(manager.loaded().is_empty());
    }
}
