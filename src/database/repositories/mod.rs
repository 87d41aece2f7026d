//! SeaORM repository implementations
//!
//! Repositories own all query logic and convert entity models into the
//! domain types from `crate::models`.

pub mod blacklist;
pub mod config;
pub mod provider_stats;
pub mod scoring;
pub mod subtitle_download;
pub mod upgrade_history;
pub mod wanted;
pub mod watched_folders;

pub use blacklist::BlacklistRepository;
pub use config::ConfigEntryRepository;
pub use provider_stats::ProviderStatsRepository;
pub use scoring::ScoringRepository;
pub use subtitle_download::SubtitleDownloadRepository;
pub use upgrade_history::UpgradeHistoryRepository;
pub use wanted::WantedRepository;
pub use watched_folders::WatchedFolderRepository;
