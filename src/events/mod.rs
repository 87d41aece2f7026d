//! Internal event bus
//!
//! A catalog-defined set of named signals. `emit` fans an event out to
//! in-process subscribers registered at init and onto a broadcast channel
//! that feeds the SSE push endpoint for browsers.
//!
//! The catalog is the authoritative schema: payload keys not enumerated for
//! an event are dropped before publication. Payloads carry small scalars
//! only: no secrets and no absolute filesystem paths.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::warn;
use utoipa::ToSchema;

/// Catalog version for payload schema evolution
pub const CATALOG_VERSION: u32 = 1;

/// Capacity of the push-channel buffer; slow consumers drop old events
const BROADCAST_CAPACITY: usize = 256;

/// Every event the system can publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SubtitleDownloaded,
    ProviderSearchComplete,
    ProviderFailed,
    WantedScanComplete,
    WantedItemProcessed,
    UpgradeComplete,
    WebhookReceived,
    WebhookStageComplete,
    WebhookCompleted,
    ConfigUpdated,
    TranslationComplete,
    TranslationFailed,
    PluginsReloaded,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::SubtitleDownloaded,
        EventKind::ProviderSearchComplete,
        EventKind::ProviderFailed,
        EventKind::WantedScanComplete,
        EventKind::WantedItemProcessed,
        EventKind::UpgradeComplete,
        EventKind::WebhookReceived,
        EventKind::WebhookStageComplete,
        EventKind::WebhookCompleted,
        EventKind::ConfigUpdated,
        EventKind::TranslationComplete,
        EventKind::TranslationFailed,
        EventKind::PluginsReloaded,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SubtitleDownloaded => "subtitle_downloaded",
            EventKind::ProviderSearchComplete => "provider_search_complete",
            EventKind::ProviderFailed => "provider_failed",
            EventKind::WantedScanComplete => "wanted_scan_complete",
            EventKind::WantedItemProcessed => "wanted_item_processed",
            EventKind::UpgradeComplete => "upgrade_complete",
            EventKind::WebhookReceived => "webhook_received",
            EventKind::WebhookStageComplete => "webhook_stage_complete",
            EventKind::WebhookCompleted => "webhook_completed",
            EventKind::ConfigUpdated => "config_updated",
            EventKind::TranslationComplete => "translation_complete",
            EventKind::TranslationFailed => "translation_failed",
            EventKind::PluginsReloaded => "plugins_reloaded",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::SubtitleDownloaded => "Subtitle Downloaded",
            EventKind::ProviderSearchComplete => "Provider Search Complete",
            EventKind::ProviderFailed => "Provider Failed",
            EventKind::WantedScanComplete => "Wanted Scan Complete",
            EventKind::WantedItemProcessed => "Wanted Item Processed",
            EventKind::UpgradeComplete => "Upgrade Complete",
            EventKind::WebhookReceived => "Webhook Received",
            EventKind::WebhookStageComplete => "Webhook Stage Complete",
            EventKind::WebhookCompleted => "Webhook Completed",
            EventKind::ConfigUpdated => "Config Updated",
            EventKind::TranslationComplete => "Translation Complete",
            EventKind::TranslationFailed => "Translation Failed",
            EventKind::PluginsReloaded => "Plugins Reloaded",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EventKind::SubtitleDownloaded => {
                "A subtitle file was successfully downloaded from a provider."
            }
            EventKind::ProviderSearchComplete => "A provider search returned results.",
            EventKind::ProviderFailed => "A provider search or download failed.",
            EventKind::WantedScanComplete => {
                "The periodic library scanner completed a full scan cycle."
            }
            EventKind::WantedItemProcessed => "A single wanted item was searched and processed.",
            EventKind::UpgradeComplete => "A subtitle was upgraded (e.g. SRT replaced with ASS).",
            EventKind::WebhookReceived => {
                "An incoming webhook from Sonarr or Radarr was received."
            }
            EventKind::WebhookStageComplete => "One stage of a webhook pipeline finished.",
            EventKind::WebhookCompleted => "A webhook pipeline finished all of its stages.",
            EventKind::ConfigUpdated => "Application configuration was changed.",
            EventKind::TranslationComplete => "A local translation job finished successfully.",
            EventKind::TranslationFailed => "A local translation job failed.",
            EventKind::PluginsReloaded => "The provider plugin directory was re-discovered.",
        }
    }

    /// Allowed payload keys. Anything else is dropped at emit time.
    pub fn payload_keys(&self) -> &'static [&'static str] {
        match self {
            EventKind::SubtitleDownloaded => &[
                "provider_name",
                "language",
                "format",
                "score",
                "title",
                "season",
                "episode",
            ],
            EventKind::ProviderSearchComplete => {
                &["provider_name", "result_count", "best_score", "title"]
            }
            EventKind::ProviderFailed => &["provider_name", "error", "error_type", "title"],
            EventKind::WantedScanComplete => {
                &["total_items", "new_items", "removed_items", "duration_ms"]
            }
            EventKind::WantedItemProcessed => &[
                "item_id",
                "title",
                "season_episode",
                "status",
                "provider_name",
                "score",
            ],
            EventKind::UpgradeComplete => &[
                "title",
                "old_format",
                "new_format",
                "old_score",
                "new_score",
                "provider_name",
            ],
            EventKind::WebhookReceived => &["source", "event_type", "title", "delay_minutes"],
            EventKind::WebhookStageComplete => &["source", "title", "stage", "success"],
            EventKind::WebhookCompleted => &["source", "title", "stages", "succeeded"],
            EventKind::ConfigUpdated => &["changed_keys", "source"],
            EventKind::TranslationComplete => {
                &["source_language", "target_language", "duration_ms", "title"]
            }
            EventKind::TranslationFailed => &["target_language", "error", "title"],
            EventKind::PluginsReloaded => &["loaded", "errors"],
        }
    }
}

/// A published event as seen by subscribers and the push channel
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub name: String,
    #[schema(value_type = Object)]
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Catalog entry served by the events listing endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogEntry {
    pub name: String,
    pub label: String,
    pub description: String,
    pub payload_keys: Vec<String>,
}

/// Full machine-readable catalog
pub fn catalog() -> Vec<CatalogEntry> {
    EventKind::ALL
        .iter()
        .map(|kind| CatalogEntry {
            name: kind.name().to_string(),
            label: kind.label().to_string(),
            description: kind.description().to_string(),
            payload_keys: kind.payload_keys().iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}

type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// In-process pub/sub with a broadcast bridge for push consumers
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    push: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (push, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            subscribers: RwLock::new(Vec::new()),
            push,
        }
    }

    /// Register an in-process callback; called synchronously on emit
    pub fn subscribe_fn<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .push(Box::new(callback));
    }

    /// Receiver for the outbound push channel (SSE bridge)
    pub fn subscribe_push(&self) -> broadcast::Receiver<Event> {
        self.push.subscribe()
    }

    /// Publish an event. Payload keys outside the catalog are dropped.
    pub fn emit(&self, kind: EventKind, payload: Map<String, Value>) {
        let allowed = kind.payload_keys();
        let mut filtered = Map::new();
        for (key, value) in payload {
            if allowed.contains(&key.as_str()) {
                filtered.insert(key, value);
            } else {
                warn!(
                    "Dropping payload key '{key}' not in catalog for event '{}'",
                    kind.name()
                );
            }
        }

        let event = Event {
            name: kind.name().to_string(),
            payload: filtered,
            timestamp: Utc::now(),
        };

        for subscriber in self
            .subscribers
            .read()
            .expect("event bus lock poisoned")
            .iter()
        {
            subscriber(&event);
        }

        // No push consumers connected is fine
        let _ = self.push.send(event);
    }
}

/// Convenience macro for building event payloads
#[macro_export]
macro_rules! event_payload {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = serde_json::Map::new();
        $(map.insert($key.to_string(), serde_json::Value::from($value));)*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn catalog_covers_every_kind() {
        let entries = catalog();
        assert_eq!(entries.len(), EventKind::ALL.len());
        assert!(entries.iter().any(|e| e.name == "wanted_item_processed"));
    }

    #[test]
    fn emit_reaches_subscribers_and_push_channel() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe_fn(move |event| {
            assert_eq!(event.name, "wanted_item_processed");
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        let mut rx = bus.subscribe_push();

        bus.emit(
            EventKind::WantedItemProcessed,
            event_payload! { "item_id" => 7, "status" => "done" },
        );

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload.get("item_id").unwrap(), 7);
    }

    #[test]
    fn uncataloged_payload_keys_are_dropped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_push();

        bus.emit(
            EventKind::WantedItemProcessed,
            event_payload! {
                "item_id" => 1,
                "media_file_path" => "/absolute/path/leaks.mkv",
            },
        );

        let event = rx.try_recv().unwrap();
        assert!(event.payload.contains_key("item_id"));
        assert!(!event.payload.contains_key("media_file_path"));
    }
}
