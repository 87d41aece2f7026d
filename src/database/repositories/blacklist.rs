//! SeaORM-based blacklist repository
//!
//! Uniqueness on `(provider_name, external_id)`; adding an already-listed
//! release is treated as success of the pre-existing row.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{blacklist, prelude::Blacklist};
use crate::models::{BlacklistEntry, NewBlacklistEntry};

#[derive(Clone)]
pub struct BlacklistRepository {
    connection: Arc<DatabaseConnection>,
}

impl BlacklistRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn add(&self, request: NewBlacklistEntry) -> Result<BlacklistEntry> {
        if let Some(existing) = self
            .find_by_release(&request.provider_name, &request.external_id)
            .await?
        {
            return Ok(existing);
        }

        let active = blacklist::ActiveModel {
            provider_name: Set(request.provider_name.clone()),
            external_id: Set(request.external_id.clone()),
            language: Set(request.language),
            media_file_path: Set(request.media_file_path),
            title: Set(request.title),
            reason: Set(request.reason),
            added_at: Set(Utc::now()),
            ..Default::default()
        };

        match active.insert(&*self.connection).await {
            Ok(model) => Ok(model_to_domain(model)),
            // Insert race on the unique index: return the winning row
            Err(e) => match self
                .find_by_release(&request.provider_name, &request.external_id)
                .await?
            {
                Some(existing) => Ok(existing),
                None => Err(e.into()),
            },
        }
    }

    pub async fn find_by_release(
        &self,
        provider_name: &str,
        external_id: &str,
    ) -> Result<Option<BlacklistEntry>> {
        let model = Blacklist::find()
            .filter(blacklist::Column::ProviderName.eq(provider_name))
            .filter(blacklist::Column::ExternalId.eq(external_id))
            .one(&*self.connection)
            .await?;
        Ok(model.map(model_to_domain))
    }

    /// Set of `(provider, external_id)` pairs for fast candidate filtering
    pub async fn blocked_releases(&self) -> Result<HashSet<(String, String)>> {
        let models = Blacklist::find().all(&*self.connection).await?;
        Ok(models
            .into_iter()
            .map(|m| (m.provider_name, m.external_id))
            .collect())
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = Blacklist::delete_by_id(id).exec(&*self.connection).await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn list(&self, page: u64, per_page: u64) -> Result<(Vec<BlacklistEntry>, u64)> {
        let paginator = Blacklist::find()
            .order_by_desc(blacklist::Column::AddedAt)
            .order_by_desc(blacklist::Column::Id)
            .paginate(&*self.connection, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((models.into_iter().map(model_to_domain).collect(), total))
    }
}

fn model_to_domain(model: blacklist::Model) -> BlacklistEntry {
    BlacklistEntry {
        id: model.id,
        provider_name: model.provider_name,
        external_id: model.external_id,
        language: model.language,
        media_file_path: model.media_file_path,
        title: model.title,
        reason: model.reason,
        added_at: model.added_at,
    }
}
