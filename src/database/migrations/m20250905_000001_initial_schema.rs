use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_wanted_items_table(manager).await?;
        self.create_subtitle_downloads_table(manager).await?;
        self.create_upgrade_history_table(manager).await?;
        self.create_blacklist_table(manager).await?;
        self.create_provider_stats_table(manager).await?;
        self.create_provider_score_modifiers_table(manager).await?;
        self.create_scoring_weights_table(manager).await?;
        self.create_config_entries_table(manager).await?;
        self.create_watched_folders_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchedFolders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScoringWeights::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderScoreModifiers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Blacklist::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UpgradeHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubtitleDownloads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WantedItems::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn id_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.big_integer().not_null().auto_increment().primary_key();
        col
    }

    fn timestamp_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.timestamp().not_null();
        col
    }

    fn nullable_timestamp_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.timestamp();
        col
    }

    async fn create_wanted_items_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WantedItems::Table)
                    .if_not_exists()
                    .col(self.id_column(WantedItems::Id))
                    .col(ColumnDef::new(WantedItems::Kind).string().not_null())
                    .col(
                        ColumnDef::new(WantedItems::MediaFilePath)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WantedItems::TargetLanguage)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WantedItems::SubtitleKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WantedItems::Status)
                            .string()
                            .not_null()
                            .default("wanted"),
                    )
                    .col(
                        ColumnDef::new(WantedItems::SearchCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.nullable_timestamp_column(WantedItems::LastSearchAt))
                    .col(self.nullable_timestamp_column(WantedItems::RetryAfter))
                    .col(
                        ColumnDef::new(WantedItems::CurrentScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WantedItems::UpgradeCandidate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WantedItems::SeriesId).big_integer())
                    .col(ColumnDef::new(WantedItems::EpisodeId).big_integer())
                    .col(ColumnDef::new(WantedItems::MovieId).big_integer())
                    .col(ColumnDef::new(WantedItems::Title).string())
                    .col(self.timestamp_column(WantedItems::CreatedAt))
                    .col(self.timestamp_column(WantedItems::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_subtitle_downloads_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubtitleDownloads::Table)
                    .if_not_exists()
                    .col(self.id_column(SubtitleDownloads::Id))
                    .col(
                        ColumnDef::new(SubtitleDownloads::ProviderName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::ExternalId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::Language)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::Format)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::InstalledPath)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::SubtitleKind)
                            .string()
                            .not_null()
                            .default("full"),
                    )
                    .col(
                        ColumnDef::new(SubtitleDownloads::Source)
                            .string()
                            .not_null()
                            .default("provider"),
                    )
                    .col(self.timestamp_column(SubtitleDownloads::DownloadedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_upgrade_history_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UpgradeHistory::Table)
                    .if_not_exists()
                    .col(self.id_column(UpgradeHistory::Id))
                    .col(
                        ColumnDef::new(UpgradeHistory::MediaFilePath)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpgradeHistory::OldFormat)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpgradeHistory::OldScore)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpgradeHistory::NewFormat)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpgradeHistory::NewScore)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpgradeHistory::ProviderName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UpgradeHistory::Reason).string().not_null())
                    .col(self.timestamp_column(UpgradeHistory::UpgradedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_blacklist_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Blacklist::Table)
                    .if_not_exists()
                    .col(self.id_column(Blacklist::Id))
                    .col(ColumnDef::new(Blacklist::ProviderName).string().not_null())
                    .col(ColumnDef::new(Blacklist::ExternalId).string().not_null())
                    .col(ColumnDef::new(Blacklist::Language).string().not_null())
                    .col(
                        ColumnDef::new(Blacklist::MediaFilePath)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Blacklist::Title).string())
                    .col(ColumnDef::new(Blacklist::Reason).string())
                    .col(self.timestamp_column(Blacklist::AddedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_provider_stats_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderStats::ProviderName)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::TotalSearches)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::Successes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::Failures)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::AvgScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(self.nullable_timestamp_column(ProviderStats::LastSuccessAt))
                    .col(self.nullable_timestamp_column(ProviderStats::LastFailureAt))
                    .col(
                        ColumnDef::new(ProviderStats::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::AvgResponseTimeMs)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(ProviderStats::AutoDisabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(self.nullable_timestamp_column(ProviderStats::DisabledUntil))
                    .col(self.timestamp_column(ProviderStats::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_provider_score_modifiers_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderScoreModifiers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderScoreModifiers::ProviderName)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderScoreModifiers::Modifier)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.timestamp_column(ProviderScoreModifiers::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_scoring_weights_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScoringWeights::Table)
                    .if_not_exists()
                    .col(self.id_column(ScoringWeights::Id))
                    .col(
                        ColumnDef::new(ScoringWeights::ScoreType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScoringWeights::WeightKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScoringWeights::WeightValue)
                            .integer()
                            .not_null(),
                    )
                    .col(self.timestamp_column(ScoringWeights::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_config_entries_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConfigEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigEntries::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConfigEntries::Value).string().not_null())
                    .col(self.timestamp_column(ConfigEntries::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_watched_folders_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchedFolders::Table)
                    .if_not_exists()
                    .col(self.id_column(WatchedFolders::Id))
                    .col(
                        ColumnDef::new(WatchedFolders::Path)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(WatchedFolders::Label).string())
                    .col(
                        ColumnDef::new(WatchedFolders::MediaKind)
                            .string()
                            .not_null()
                            .default("movie"),
                    )
                    .col(
                        ColumnDef::new(WatchedFolders::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.nullable_timestamp_column(WatchedFolders::LastScanAt))
                    .col(self.timestamp_column(WatchedFolders::CreatedAt))
                    .col(self.timestamp_column(WatchedFolders::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Deduplication guarantee for wanted items; insert races resolve here
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wanted_items_unique_triple")
                    .table(WantedItems::Table)
                    .col(WantedItems::MediaFilePath)
                    .col(WantedItems::TargetLanguage)
                    .col(WantedItems::SubtitleKind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_blacklist_unique_release")
                    .table(Blacklist::Table)
                    .col(Blacklist::ProviderName)
                    .col(Blacklist::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_scoring_weights_unique_key")
                    .table(ScoringWeights::Table)
                    .col(ScoringWeights::ScoreType)
                    .col(ScoringWeights::WeightKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_subtitle_downloads_path")
                    .table(SubtitleDownloads::Table)
                    .col(SubtitleDownloads::InstalledPath)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_upgrade_history_path")
                    .table(UpgradeHistory::Table)
                    .col(UpgradeHistory::MediaFilePath)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum WantedItems {
    Table,
    Id,
    Kind,
    MediaFilePath,
    TargetLanguage,
    SubtitleKind,
    Status,
    SearchCount,
    LastSearchAt,
    RetryAfter,
    CurrentScore,
    UpgradeCandidate,
    SeriesId,
    EpisodeId,
    MovieId,
    Title,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SubtitleDownloads {
    Table,
    Id,
    ProviderName,
    ExternalId,
    Language,
    Format,
    InstalledPath,
    Score,
    SubtitleKind,
    Source,
    DownloadedAt,
}

#[derive(DeriveIden)]
enum UpgradeHistory {
    Table,
    Id,
    MediaFilePath,
    OldFormat,
    OldScore,
    NewFormat,
    NewScore,
    ProviderName,
    Reason,
    UpgradedAt,
}

#[derive(DeriveIden)]
enum Blacklist {
    Table,
    Id,
    ProviderName,
    ExternalId,
    Language,
    MediaFilePath,
    Title,
    Reason,
    AddedAt,
}

#[derive(DeriveIden)]
enum ProviderStats {
    Table,
    ProviderName,
    TotalSearches,
    Successes,
    Failures,
    AvgScore,
    LastSuccessAt,
    LastFailureAt,
    ConsecutiveFailures,
    AvgResponseTimeMs,
    AutoDisabled,
    DisabledUntil,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProviderScoreModifiers {
    Table,
    ProviderName,
    Modifier,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ScoringWeights {
    Table,
    Id,
    ScoreType,
    WeightKey,
    WeightValue,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ConfigEntries {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WatchedFolders {
    Table,
    Id,
    Path,
    Label,
    MediaKind,
    Enabled,
    LastScanAt,
    CreatedAt,
    UpdatedAt,
}
