//! Indexes backing the scheduler's due-item query.
//!
//! `list_due` filters on status and orders by retry_after; the status
//! listing endpoints additionally filter by kind.

use sea_orm_migration::prelude::*;

use super::m20250905_000001_initial_schema::WantedItems;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wanted_items_status_kind")
                    .table(WantedItems::Table)
                    .col(WantedItems::Status)
                    .col(WantedItems::Kind)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wanted_items_retry_after")
                    .table(WantedItems::Table)
                    .col(WantedItems::RetryAfter)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_wanted_items_retry_after")
                    .table(WantedItems::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_wanted_items_status_kind")
                    .table(WantedItems::Table)
                    .to_owned(),
            )
            .await
    }
}
