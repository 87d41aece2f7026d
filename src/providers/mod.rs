//! Subtitle provider subsystem
//!
//! Providers implement the [`SubtitleProvider`] capability set and live in a
//! process-wide [`ProviderRegistry`]. Built-ins are compiled in and
//! registered at init; plugins are declarative definitions discovered from
//! the plugin directory and hot-reloaded on change. The
//! [`ProviderAggregator`] turns a search intent into a best candidate (or
//! no-result) behind per-provider circuit breakers and the response cache.

pub mod aggregator;
pub mod builtin;
pub mod detection;
pub mod manifest;
pub mod plugins;
pub mod registry;
pub mod scoring;
pub mod traits;

pub use aggregator::{InstallOutcome, ProviderAggregator};
pub use manifest::{ConfigFieldDescriptor, ConfigFieldKind, ProviderManifest};
pub use registry::ProviderRegistry;
pub use traits::SubtitleProvider;
