//! SeaORM-based upgrade history repository (append-only)

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
};
use std::sync::Arc;

use crate::entities::{prelude::UpgradeHistory, upgrade_history};
use crate::models::{SubtitleFormat, UpgradeRecord};

/// Request for recording a completed upgrade
#[derive(Debug, Clone)]
pub struct UpgradeRecordRequest {
    pub media_file_path: String,
    pub old_format: SubtitleFormat,
    pub old_score: i32,
    pub new_format: SubtitleFormat,
    pub new_score: i32,
    pub provider_name: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct UpgradeHistoryRepository {
    connection: Arc<DatabaseConnection>,
}

impl UpgradeHistoryRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn record(&self, request: UpgradeRecordRequest) -> Result<UpgradeRecord> {
        let active = upgrade_history::ActiveModel {
            media_file_path: Set(request.media_file_path),
            old_format: Set(request.old_format.to_string()),
            old_score: Set(request.old_score),
            new_format: Set(request.new_format.to_string()),
            new_score: Set(request.new_score),
            provider_name: Set(request.provider_name),
            reason: Set(request.reason),
            upgraded_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(&*self.connection).await?;
        Ok(model_to_domain(model))
    }

    pub async fn list(&self, page: u64, per_page: u64) -> Result<(Vec<UpgradeRecord>, u64)> {
        let paginator = UpgradeHistory::find()
            .order_by_desc(upgrade_history::Column::UpgradedAt)
            .order_by_desc(upgrade_history::Column::Id)
            .paginate(&*self.connection, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((models.into_iter().map(model_to_domain).collect(), total))
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(UpgradeHistory::find().count(&*self.connection).await?)
    }
}

fn model_to_domain(model: upgrade_history::Model) -> UpgradeRecord {
    UpgradeRecord {
        id: model.id,
        media_file_path: model.media_file_path,
        old_format: SubtitleFormat::parse(&model.old_format),
        old_score: model.old_score,
        new_format: SubtitleFormat::parse(&model.new_format),
        new_score: model.new_score,
        provider_name: model.provider_name,
        reason: model.reason,
        upgraded_at: model.upgraded_at,
    }
}
