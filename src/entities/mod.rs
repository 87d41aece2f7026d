//! SeaORM entity definitions
//!
//! One module per table. Columns use plain portable types (strings for
//! domain enums); conversion to typed domain models happens in the
//! repository layer.

pub mod blacklist;
pub mod config_entries;
pub mod provider_score_modifiers;
pub mod provider_stats;
pub mod scoring_weights;
pub mod subtitle_downloads;
pub mod upgrade_history;
pub mod wanted_items;
pub mod watched_folders;

pub mod prelude {
    pub use super::blacklist::Entity as Blacklist;
    pub use super::config_entries::Entity as ConfigEntries;
    pub use super::provider_score_modifiers::Entity as ProviderScoreModifiers;
    pub use super::provider_stats::Entity as ProviderStats;
    pub use super::scoring_weights::Entity as ScoringWeights;
    pub use super::subtitle_downloads::Entity as SubtitleDownloads;
    pub use super::upgrade_history::Entity as UpgradeHistory;
    pub use super::wanted_items::Entity as WantedItems;
    pub use super::watched_folders::Entity as WatchedFolders;
}
