//! SeaORM-based subtitle download history repository

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::str::FromStr;
use std::sync::Arc;

use crate::entities::{prelude::SubtitleDownloads, subtitle_downloads};
use crate::models::{DownloadSource, SubtitleDownload, SubtitleFormat, SubtitleKind};

/// Request for recording a completed install
#[derive(Debug, Clone)]
pub struct DownloadRecordRequest {
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub format: SubtitleFormat,
    pub installed_path: String,
    pub score: i32,
    pub subtitle_kind: SubtitleKind,
    pub source: DownloadSource,
}

#[derive(Clone)]
pub struct SubtitleDownloadRepository {
    connection: Arc<DatabaseConnection>,
}

impl SubtitleDownloadRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Append a download record; written exactly once per successful install
    pub async fn record(&self, request: DownloadRecordRequest) -> Result<SubtitleDownload> {
        let active = subtitle_downloads::ActiveModel {
            provider_name: Set(request.provider_name),
            external_id: Set(request.external_id),
            language: Set(request.language),
            format: Set(request.format.to_string()),
            installed_path: Set(request.installed_path),
            score: Set(request.score),
            subtitle_kind: Set(request.subtitle_kind.to_string()),
            source: Set(request.source.to_string()),
            downloaded_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(&*self.connection).await?;
        model_to_domain(model)
    }

    pub async fn find_by_installed_path(&self, path: &str) -> Result<Option<SubtitleDownload>> {
        let model = SubtitleDownloads::find()
            .filter(subtitle_downloads::Column::InstalledPath.eq(path))
            .order_by_desc(subtitle_downloads::Column::DownloadedAt)
            .one(&*self.connection)
            .await?;
        model.map(model_to_domain).transpose()
    }

    /// Newest-first paginated download history
    pub async fn list(&self, page: u64, per_page: u64) -> Result<(Vec<SubtitleDownload>, u64)> {
        let paginator = SubtitleDownloads::find()
            .order_by_desc(subtitle_downloads::Column::DownloadedAt)
            .order_by_desc(subtitle_downloads::Column::Id)
            .paginate(&*self.connection, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        let items = models
            .into_iter()
            .map(model_to_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }
}

fn model_to_domain(model: subtitle_downloads::Model) -> Result<SubtitleDownload> {
    Ok(SubtitleDownload {
        id: model.id,
        provider_name: model.provider_name,
        external_id: model.external_id,
        language: model.language,
        format: SubtitleFormat::parse(&model.format),
        installed_path: model.installed_path,
        score: model.score,
        subtitle_kind: SubtitleKind::from_str(&model.subtitle_kind)
            .map_err(|_| anyhow!("invalid subtitle kind in download {}", model.id))?,
        source: DownloadSource::from_str(&model.source)
            .map_err(|_| anyhow!("invalid source in download {}", model.id))?,
        downloaded_at: model.downloaded_at,
    })
}
