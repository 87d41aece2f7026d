//! Provider manifest and config field descriptors
//!
//! The manifest is what the UI renders on the providers page: metadata,
//! declared languages and the config fields a provider accepts.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Input widget type for a provider config field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFieldKind {
    #[default]
    Text,
    Password,
    Number,
}

/// Describes one configurable field of a provider
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct ConfigFieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub kind: ConfigFieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
}

/// Static provider metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct ProviderManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config_fields: Vec<ConfigFieldDescriptor>,
    /// Languages the provider declares coverage for (empty = unspecified)
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub requires_auth: bool,
}

impl ProviderManifest {
    /// Auth is required when any config field is marked required
    pub fn derive_requires_auth(mut self) -> Self {
        self.requires_auth = self.config_fields.iter().any(|f| f.required);
        self
    }
}
