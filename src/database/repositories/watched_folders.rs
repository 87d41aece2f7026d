//! Watched-folder repository: standalone scan roots

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::str::FromStr;
use std::sync::Arc;

use crate::entities::{prelude::WatchedFolders, watched_folders};
use crate::models::{MediaKind, WatchedFolder};

#[derive(Clone)]
pub struct WatchedFolderRepository {
    connection: Arc<DatabaseConnection>,
}

impl WatchedFolderRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn list_enabled(&self) -> Result<Vec<WatchedFolder>> {
        let models = WatchedFolders::find()
            .filter(watched_folders::Column::Enabled.eq(true))
            .order_by_asc(watched_folders::Column::Path)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    pub async fn list(&self) -> Result<Vec<WatchedFolder>> {
        let models = WatchedFolders::find()
            .order_by_asc(watched_folders::Column::Path)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    pub async fn add(
        &self,
        path: &str,
        label: Option<String>,
        media_kind: MediaKind,
    ) -> Result<WatchedFolder> {
        let now = Utc::now();
        let active = watched_folders::ActiveModel {
            path: Set(path.to_string()),
            label: Set(label),
            media_kind: Set(media_kind.to_string()),
            enabled: Set(true),
            last_scan_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(&*self.connection).await?;
        model_to_domain(model)
    }

    pub async fn touch_scanned(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let model = WatchedFolders::find_by_id(id)
            .one(&*self.connection)
            .await?;
        if let Some(model) = model {
            let mut active: watched_folders::ActiveModel = model.into();
            active.last_scan_at = Set(Some(at));
            active.updated_at = Set(at);
            active.update(&*self.connection).await?;
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = WatchedFolders::delete_by_id(id)
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

fn model_to_domain(model: watched_folders::Model) -> Result<WatchedFolder> {
    Ok(WatchedFolder {
        id: model.id,
        path: model.path,
        label: model.label,
        media_kind: MediaKind::from_str(&model.media_kind)
            .map_err(|_| anyhow!("invalid media kind in watched folder {}", model.id))?,
        enabled: model.enabled,
        last_scan_at: model.last_scan_at,
    })
}
