//! Provider capability contract

use async_trait::async_trait;

use crate::errors::ProviderResult;
use crate::models::{SearchQuery, SubtitleCandidate};

use super::manifest::ProviderManifest;

/// The capability set every subtitle provider offers.
///
/// Implementations are values in the registry map; built-ins and plugins
/// are the same type to the rest of the system. Both operations are called
/// under a wall-clock timeout by the aggregator; implementations do not
/// need their own deadline handling.
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Unique lowercase provider name
    fn name(&self) -> &str;

    /// Static metadata: version, author, config field descriptors,
    /// declared languages, auth requirement
    fn manifest(&self) -> ProviderManifest;

    /// Search for subtitle candidates matching the query fingerprint
    async fn search(&self, query: &SearchQuery) -> ProviderResult<Vec<SubtitleCandidate>>;

    /// Fetch the subtitle content for a previously returned candidate
    async fn download(&self, candidate: &SubtitleCandidate) -> ProviderResult<Vec<u8>>;
}
