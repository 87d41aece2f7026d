//! Provider registry
//!
//! Polymorphic map of provider name to capability set. Built-ins are fixed
//! at construction; the plugin set is swapped atomically on reload so
//! readers never observe a partially reloaded registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::errors::ProviderError;

use super::traits::SubtitleProvider;

type ProviderMap = HashMap<String, Arc<dyn SubtitleProvider>>;

pub struct ProviderRegistry {
    builtins: ProviderMap,
    /// Combined view (builtins + plugins); replaced wholesale on reload
    combined: RwLock<Arc<ProviderMap>>,
}

impl ProviderRegistry {
    /// Build the registry from the compiled-in providers
    pub fn new(builtins: Vec<Arc<dyn SubtitleProvider>>) -> Result<Self, ProviderError> {
        let mut map: ProviderMap = HashMap::new();
        for provider in builtins {
            let name = provider.name().to_string();
            if map.insert(name.clone(), provider).is_some() {
                return Err(ProviderError::InvalidPlugin {
                    file: "<builtin>".to_string(),
                    message: format!("duplicate built-in provider name '{name}'"),
                });
            }
        }
        info!(
            "Provider registry initialised with {} built-in provider(s)",
            map.len()
        );
        let combined = Arc::new(map.clone());
        Ok(Self {
            builtins: map,
            combined: RwLock::new(combined),
        })
    }

    /// Names that plugins may not collide with
    pub fn builtin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Atomically replace the plugin set. The new combined map is built off
    /// to the side and swapped in one store.
    pub fn swap_plugins(&self, plugins: Vec<Arc<dyn SubtitleProvider>>) {
        let mut map = self.builtins.clone();
        for plugin in plugins {
            map.insert(plugin.name().to_string(), plugin);
        }
        let next = Arc::new(map);
        *self.combined.write().expect("registry lock poisoned") = next;
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SubtitleProvider>> {
        self.snapshot().get(name).cloned()
    }

    /// Consistent point-in-time view of all providers
    pub fn snapshot(&self) -> Arc<ProviderMap> {
        self.combined.read().expect("registry lock poisoned").clone()
    }

    /// All providers sorted by name
    pub fn all(&self) -> Vec<Arc<dyn SubtitleProvider>> {
        let snapshot = self.snapshot();
        let mut providers: Vec<_> = snapshot.values().cloned().collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderResult;
    use crate::models::{SearchQuery, SubtitleCandidate};
    use crate::providers::manifest::ProviderManifest;
    use async_trait::async_trait;

    struct FakeProvider {
        name: String,
    }

    #[async_trait]
    impl SubtitleProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn manifest(&self) -> ProviderManifest {
            ProviderManifest {
                name: self.name.clone(),
                version: "0.0.0".to_string(),
                ..Default::default()
            }
        }

        async fn search(&self, _query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>> {
            Ok(Vec::new())
        }

        async fn download(&self, _candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn fake(name: &str) -> Arc<dyn SubtitleProvider> {
        Arc::new(FakeProvider {
            name: name.to_string(),
        })
    }

    #[test]
    fn duplicate_builtin_names_are_rejected() {
        let result = ProviderRegistry::new(vec![fake("dup"), fake("dup")]);
        assert!(result.is_err());
    }

    #[test]
    fn swap_plugins_is_atomic_and_keeps_builtins() {
        let registry = ProviderRegistry::new(vec![fake("builtin")]).unwrap();
        let before = registry.snapshot();

        registry.swap_plugins(vec![fake("plugin_a"), fake("plugin_b")]);

        // The pre-swap snapshot is untouched; the new one has all three
        assert_eq!(before.len(), 1);
        assert_eq!(
            registry.names(),
            vec!["builtin", "plugin_a", "plugin_b"]
        );

        // Swapping again with an empty set drops the plugins only
        registry.swap_plugins(Vec::new());
        assert_eq!(registry.names(), vec!["builtin"]);
    }
}
